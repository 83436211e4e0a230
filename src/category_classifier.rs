//! Keyword heuristics that pick one of the user's own categories for an
//! imported transaction. Best effort only: no match leaves the transaction
//! uncategorized.

use crate::models::{Category, CategoryKind};

struct ClassificationRule {
    category_kind: CategoryKind,
    name_markers: &'static [&'static str],
    description_keywords: &'static [&'static str],
}

/// Evaluated in order; the first rule with both a matching category and a
/// matching description wins.
const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        category_kind: CategoryKind::Expense,
        name_markers: &["rent"],
        description_keywords: &["rent", "utilities", "electricity", "water"],
    },
    ClassificationRule {
        category_kind: CategoryKind::Income,
        name_markers: &["salary", "sales"],
        description_keywords: &["salary", "payment received", "sales"],
    },
];

/// Returns the category to assign, if any.
pub fn classify<'a>(description: &str, categories: &'a [Category]) -> Option<&'a Category> {
    let desc = description.to_lowercase();
    RULES.iter().find_map(|rule| {
        if !rule.description_keywords.iter().any(|k| desc.contains(k)) {
            return None;
        }
        categories.iter().find(|cat| {
            let name = cat.name.to_lowercase();
            cat.kind == rule.category_kind && rule.name_markers.iter().any(|m| name.contains(m))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: &str, name: &str, kind: CategoryKind) -> Category {
        Category {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: name.to_string(),
            kind,
            color: "#0F392B".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn defaults() -> Vec<Category> {
        vec![
            category("salary", "Salary", CategoryKind::Income),
            category("sales", "Sales", CategoryKind::Income),
            category("rent", "Office Rent", CategoryKind::Expense),
            category("util", "Utilities", CategoryKind::Expense),
        ]
    }

    #[test]
    fn rent_like_expenses_go_to_the_rent_category() {
        let cats = defaults();
        assert_eq!(classify("Office Rent Jan", &cats).map(|c| c.id.as_str()), Some("rent"));
        assert_eq!(classify("ELECTRICITY BILL", &cats).map(|c| c.id.as_str()), Some("rent"));
    }

    #[test]
    fn income_keywords_pick_first_salary_or_sales_category() {
        let cats = defaults();
        assert_eq!(classify("NEFT SALARY ACME", &cats).map(|c| c.id.as_str()), Some("salary"));
        assert_eq!(classify("Payment received from client", &cats).map(|c| c.id.as_str()), Some("salary"));
    }

    #[test]
    fn expense_rule_is_checked_before_income_rule() {
        let cats = defaults();
        assert_eq!(classify("salary advance for rent", &cats).map(|c| c.id.as_str()), Some("rent"));
    }

    #[test]
    fn falls_through_when_category_is_missing() {
        let cats = vec![category("sales", "Sales", CategoryKind::Income)];
        // no rent category, so the expense rule cannot fire
        assert!(classify("water bill", &cats).is_none());
        // income rule still applies
        assert_eq!(classify("rent and sales", &cats).map(|c| c.id.as_str()), Some("sales"));
        // kind must match, not just the name
        let cats = vec![category("x", "Rent Income", CategoryKind::Income)];
        assert!(classify("rent", &cats).is_none());
        assert!(classify("coffee", &defaults()).is_none());
    }
}
