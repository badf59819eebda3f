use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for SQL identifiers derived from owner types and attachment fields
    /// Must start with a lowercase letter or underscore, then lowercase alphanumerics/underscores
    /// - Valid: "invoice", "sales_order", "_tmp1"
    /// - Invalid: "1invoice", "Invoice", "sales-order", "a;drop"
    pub static ref IDENTIFIER_REGEX: Regex = Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").unwrap();
}

/// Map an owner type such as "Sales Order" to its table name ("sales_order").
///
/// Returns `None` when the result is not a safe SQL identifier.
pub fn owner_table_name(owner_type: &str) -> Option<String> {
    let table = owner_type.trim().to_lowercase().replace([' ', '-'], "_");
    IDENTIFIER_REGEX.is_match(&table).then_some(table)
}

/// Validate a column name taken from a file row
pub fn column_name(field: &str) -> Option<&str> {
    IDENTIFIER_REGEX.is_match(field).then_some(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_regex_valid() {
        assert!(IDENTIFIER_REGEX.is_match("invoice"));
        assert!(IDENTIFIER_REGEX.is_match("sales_order"));
        assert!(IDENTIFIER_REGEX.is_match("_tmp1"));
    }

    #[test]
    fn test_identifier_regex_invalid() {
        assert!(!IDENTIFIER_REGEX.is_match("1invoice")); // starts with digit
        assert!(!IDENTIFIER_REGEX.is_match("Invoice")); // uppercase
        assert!(!IDENTIFIER_REGEX.is_match("a;drop")); // punctuation
        assert!(!IDENTIFIER_REGEX.is_match("")); // empty
        assert!(!IDENTIFIER_REGEX.is_match("a\"b")); // quote
    }

    #[test]
    fn test_owner_table_name() {
        assert_eq!(owner_table_name("Sales Order"), Some("sales_order".to_string()));
        assert_eq!(owner_table_name("Invoice"), Some("invoice".to_string()));
        assert_eq!(owner_table_name("x\"; DROP TABLE files"), None);
    }
}
