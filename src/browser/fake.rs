// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Synthetic values for form filling

use rand::seq::SliceRandom;
use rand::Rng;

use super::form::InputKind;

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas",
    "Sarah", "Charles", "Karen", "Daniel", "Nancy", "Matthew", "Lisa", "Anthony", "Betty",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis",
    "Rodriguez", "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson",
    "Thomas", "Taylor", "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White",
];

const EMAIL_DOMAINS: &[&str] = &[
    "gmail.com", "yahoo.com", "outlook.com", "hotmail.com", "icloud.com", "proton.me",
];

const PASSWORD_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of synthetic form values
pub trait FormData: Send + Sync {
    fn email(&self) -> String;
    fn phone(&self) -> String;
    fn password(&self) -> String;
    fn name(&self) -> String;
    fn first_name(&self) -> String;
    fn middle_name(&self) -> String;
    fn last_name(&self) -> String;

    /// Value for an input kind, `None` for [`InputKind::Unknown`]
    fn value_for(&self, kind: InputKind) -> Option<String> {
        match kind {
            InputKind::Email => Some(self.email()),
            InputKind::Phone => Some(self.phone()),
            InputKind::Password => Some(self.password()),
            InputKind::Name => Some(self.name()),
            InputKind::FirstName => Some(self.first_name()),
            InputKind::MiddleName => Some(self.middle_name()),
            InputKind::LastName => Some(self.last_name()),
            InputKind::Unknown => None,
        }
    }
}

/// Random realistic-looking values
#[derive(Debug, Clone, Default)]
pub struct RandomFormData {
    password_len: usize,
}

impl RandomFormData {
    pub fn new() -> Self {
        Self { password_len: 12 }
    }

    /// Set generated password length
    pub fn password_len(mut self, len: usize) -> Self {
        self.password_len = len.max(1);
        self
    }

    fn pick(list: &[&str]) -> String {
        list.choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_default()
            .to_string()
    }
}

impl FormData for RandomFormData {
    fn email(&self) -> String {
        let mut rng = rand::thread_rng();
        format!(
            "{}.{}{}@{}",
            Self::pick(FIRST_NAMES).to_lowercase(),
            Self::pick(LAST_NAMES).to_lowercase(),
            rng.gen_range(1..1000),
            Self::pick(EMAIL_DOMAINS)
        )
    }

    fn phone(&self) -> String {
        let mut rng = rand::thread_rng();
        format!(
            "{}{:03}{:04}",
            rng.gen_range(201..990),
            rng.gen_range(200..1000),
            rng.gen_range(0..10000)
        )
    }

    fn password(&self) -> String {
        let mut rng = rand::thread_rng();
        let len = if self.password_len == 0 { 12 } else { self.password_len };
        (0..len)
            .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
            .collect()
    }

    fn name(&self) -> String {
        format!("{} {}", self.first_name(), self.last_name())
    }

    fn first_name(&self) -> String {
        Self::pick(FIRST_NAMES)
    }

    fn middle_name(&self) -> String {
        Self::pick(FIRST_NAMES)
    }

    fn last_name(&self) -> String {
        Self::pick(LAST_NAMES)
    }
}

/// Deterministic values, useful in tests and reproducible runs
#[derive(Debug, Clone)]
pub struct FixedFormData {
    pub email: String,
    pub phone: String,
    pub password: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
}

impl Default for FixedFormData {
    fn default() -> Self {
        Self {
            email: "jane.doe@example.com".to_string(),
            phone: "5555550100".to_string(),
            password: "Sup3rSecret".to_string(),
            first_name: "Jane".to_string(),
            middle_name: "Q".to_string(),
            last_name: "Doe".to_string(),
        }
    }
}

impl FormData for FixedFormData {
    fn email(&self) -> String {
        self.email.clone()
    }

    fn phone(&self) -> String {
        self.phone.clone()
    }

    fn password(&self) -> String {
        self.password.clone()
    }

    fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn first_name(&self) -> String {
        self.first_name.clone()
    }

    fn middle_name(&self) -> String {
        self.middle_name.clone()
    }

    fn last_name(&self) -> String {
        self.last_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_email_shape() {
        let data = RandomFormData::new();
        for _ in 0..20 {
            let email = data.email();
            let (local, domain) = email.split_once('@').unwrap();
            assert!(local.contains('.'));
            assert!(EMAIL_DOMAINS.contains(&domain));
        }
    }

    #[test]
    fn test_random_password_length() {
        let data = RandomFormData::new().password_len(20);
        let password = data.password();
        assert_eq!(password.len(), 20);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_phone_is_digits() {
        let phone = RandomFormData::new().phone();
        assert_eq!(phone.len(), 10);
        assert!(phone.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_value_for() {
        let data = FixedFormData::default();
        assert_eq!(data.value_for(InputKind::Email).as_deref(), Some("jane.doe@example.com"));
        assert_eq!(data.value_for(InputKind::Name).as_deref(), Some("Jane Doe"));
        assert_eq!(data.value_for(InputKind::Unknown), None);
    }
}
