use serde::{Deserialize, Serialize};

/// External notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Sms,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Sms => "sms",
        }
    }
}

impl std::fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide contact details used for external alerts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl UserContact {
    /// Create a contact. Blank values count as absent; at least one must remain.
    pub fn new(email: Option<String>, phone: Option<String>) -> Result<Self, String> {
        let email = normalize(email);
        let phone = normalize(phone);

        if email.is_none() && phone.is_none() {
            return Err("At least one of email or phone is required".to_string());
        }
        if let Some(address) = &email {
            if !address.contains('@') {
                return Err(format!("Invalid email address: {}", address));
            }
        }

        Ok(Self { email, phone })
    }

    /// Address for a channel, if this contact has one
    pub fn address_for(&self, channel: NotificationChannel) -> Option<&str> {
        match channel {
            NotificationChannel::Email => self.email.as_deref(),
            NotificationChannel::Sms => self.phone.as_deref(),
        }
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
