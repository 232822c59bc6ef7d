//! User and group allow/block lists.

use std::collections::HashSet;

use crate::config::AccessConfig;

pub const USER_BLOCKED_MESSAGE: &str = "You are not allowed to use this bot.";
pub const USER_NOT_ALLOWED_MESSAGE: &str = "You are not on the list of authorised users.";
pub const GROUP_NOT_ALLOWED_MESSAGE: &str = "Only available in authorised groups";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// Denied; `None` means drop the message without replying.
    Deny(Option<&'static str>),
}

#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allowed_users: HashSet<String>,
    blocked_users: HashSet<String>,
    allowed_groups: HashSet<String>,
    blocked_groups: HashSet<String>,
    silent_user_block: bool,
}

fn to_set(items: &[String]) -> HashSet<String> {
    items.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

impl AccessPolicy {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            allowed_users: to_set(&config.allowed_users),
            blocked_users: to_set(&config.blocked_users),
            allowed_groups: to_set(&config.allowed_groups),
            blocked_groups: to_set(&config.blocked_groups),
            silent_user_block: config.silent_user_block,
        }
    }

    /// Checks run in order: blocked user, user allow-list, then group rules.
    pub fn check(&self, user_id: &str, group_id: Option<&str>) -> AccessDecision {
        if self.blocked_users.contains(user_id) {
            let message = if self.silent_user_block { None } else { Some(USER_BLOCKED_MESSAGE) };
            return AccessDecision::Deny(message);
        }
        if !self.allowed_users.is_empty() && !self.allowed_users.contains(user_id) {
            return AccessDecision::Deny(Some(USER_NOT_ALLOWED_MESSAGE));
        }
        match group_id.filter(|g| !g.is_empty()) {
            Some(group) => {
                if self.blocked_groups.contains(group) {
                    return AccessDecision::Deny(None);
                }
                if !self.allowed_groups.is_empty() && !self.allowed_groups.contains(group) {
                    return AccessDecision::Deny(Some(GROUP_NOT_ALLOWED_MESSAGE));
                }
            }
            None => {
                if !self.allowed_groups.is_empty() {
                    return AccessDecision::Deny(Some(GROUP_NOT_ALLOWED_MESSAGE));
                }
            }
        }
        AccessDecision::Allow
    }
}
