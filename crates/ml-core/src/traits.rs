//! Core entity traits shared across crates

/// Primary key type
pub type Id = i64;

/// Trait for entities that have a primary key
pub trait Identifiable {
    fn id(&self) -> Option<Id>;
    fn is_persisted(&self) -> bool {
        self.id().is_some()
    }
    fn is_new_record(&self) -> bool {
        !self.is_persisted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(Option<Id>);

    impl Identifiable for Row {
        fn id(&self) -> Option<Id> {
            self.0
        }
    }

    #[test]
    fn test_persisted_state() {
        assert!(Row(Some(7)).is_persisted());
        assert!(Row(None).is_new_record());
    }
}
