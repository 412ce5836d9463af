//! Required / forbidden / exclusive property rules

use crate::errors::SchemaError;

/// Key-set constraints for one kind of entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rules {
    /// Keys that must be present
    pub must_have: &'static [&'static str],

    /// Keys that must be absent
    pub must_not_have: &'static [&'static str],

    /// When non-empty, the exact set of permitted keys
    pub must_only_have: &'static [&'static str],
}

impl Rules {
    pub const NONE: Rules = Rules {
        must_have: &[],
        must_not_have: &[],
        must_only_have: &[],
    };

    pub const fn require(keys: &'static [&'static str]) -> Self {
        Rules {
            must_have: keys,
            must_not_have: &[],
            must_only_have: &[],
        }
    }

    pub const fn forbid(mut self, keys: &'static [&'static str]) -> Self {
        self.must_not_have = keys;
        self
    }

    pub const fn only(mut self, keys: &'static [&'static str]) -> Self {
        self.must_only_have = keys;
        self
    }

    /// Check `keys` against these rules
    pub fn validate<'a, I>(&self, entity: &str, keys: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keys: Vec<&str> = keys.into_iter().collect();
        validate(entity, &keys, self)
    }
}

/// Exclusive set first, then required keys, then forbidden keys
pub fn validate(entity: &str, keys: &[&str], rules: &Rules) -> Result<(), SchemaError> {
    if !rules.must_only_have.is_empty() {
        if let Some(key) = keys
            .iter()
            .find(|k| !rules.must_only_have.iter().any(|allowed| allowed == *k))
        {
            return Err(SchemaError::UnexpectedProperty {
                entity: entity.to_string(),
                key: key.to_string(),
                allowed: rules.must_only_have.iter().map(|k| k.to_string()).collect(),
            });
        }
    }

    if let Some(key) = rules.must_have.iter().find(|k| !keys.contains(*k)) {
        return Err(SchemaError::MissingProperty {
            entity: entity.to_string(),
            key: key.to_string(),
        });
    }

    if let Some(key) = rules.must_not_have.iter().find(|k| keys.contains(*k)) {
        return Err(SchemaError::ForbiddenProperty {
            entity: entity.to_string(),
            key: key.to_string(),
        });
    }

    Ok(())
}
