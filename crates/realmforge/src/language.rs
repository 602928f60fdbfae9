//! Localised notice texts.
//!
//! Every text the server shows to a player is identified by a
//! [`LanguageKey`]. [`Language`] resolves a key for the player's
//! [`RegionType`] and falls back to English when a region has no
//! translation. Placeholders are positional: `{0}`, `{1}`, ...

use std::collections::HashMap;

use realmforge_session::RegionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageKey {
    Welcome,
    VersionMismatch,
    AuthenticationFailed,
    CharacterNotFound,
    LoggedInElsewhere,
    Busy,
    TargetBusy,
    ShopOpen,
    ExchangeRequestBlocked,
    BlockedByTarget,
    TargetBlocked,
    IncomingExchange,
    ExchangeRequested,
    ExchangeDeclined,
    ExchangeInvalidOffer,
    ExchangeFailed,
    InventoryFull,
    ItemNotFound,
    InvalidAmount,
    NoFreeCell,
    ItemTooFar,
    ShopNotAllowed,
    ShopAlreadyOpen,
    BlacklistAdded,
    BlacklistRemoved,
    AlreadyBlacklisted,
    CannotBlacklistSelf,
    FriendDeleted,
    NotAFriend,
    NoPortal,
}

impl LanguageKey {
    fn english(self) -> &'static str {
        match self {
            Self::Welcome => "Welcome, {0}.",
            Self::VersionMismatch => "Your client is outdated. Version {0} is required.",
            Self::AuthenticationFailed => "Authentication failed.",
            Self::CharacterNotFound => "This character does not exist.",
            Self::LoggedInElsewhere => "This character has logged in from another place.",
            Self::Busy => "You are busy with something else.",
            Self::TargetBusy => "{0} is busy.",
            Self::ShopOpen => "Trading is not possible while a shop is open.",
            Self::ExchangeRequestBlocked => "{0} is not accepting trade requests.",
            Self::BlockedByTarget => "{0} has blocked you.",
            Self::TargetBlocked => "You have blocked {0}.",
            Self::IncomingExchange => "{0} wants to trade with you.",
            Self::ExchangeRequested => "You asked {0} to trade.",
            Self::ExchangeDeclined => "The trade with {0} was declined.",
            Self::ExchangeInvalidOffer => "Your offer is invalid.",
            Self::ExchangeFailed => "The trade could not be completed.",
            Self::InventoryFull => "Your inventory is full.",
            Self::ItemNotFound => "That item does not exist.",
            Self::InvalidAmount => "Invalid amount.",
            Self::NoFreeCell => "There is no room to drop this here.",
            Self::ItemTooFar => "You are too far away from that item.",
            Self::ShopNotAllowed => "You cannot open a shop here.",
            Self::ShopAlreadyOpen => "Your shop is already open.",
            Self::BlacklistAdded => "{0} has been added to your blacklist.",
            Self::BlacklistRemoved => "{0} has been removed from your blacklist.",
            Self::AlreadyBlacklisted => "{0} is already on your blacklist.",
            Self::CannotBlacklistSelf => "You cannot block yourself.",
            Self::FriendDeleted => "{0} is no longer your friend.",
            Self::NotAFriend => "This character is not on your friend list.",
            Self::NoPortal => "There is no portal here.",
        }
    }
}

/// Notice texts per region with an English fallback.
#[derive(Debug, Clone)]
pub struct Language {
    texts: HashMap<(LanguageKey, RegionType), String>,
}

impl Language {
    /// The built-in tables.
    pub fn new() -> Self {
        let mut language = Self::english_only();
        for (key, text) in [
            (LanguageKey::Welcome, "Willkommen, {0}."),
            (LanguageKey::Busy, "Du bist gerade beschäftigt."),
            (LanguageKey::TargetBusy, "{0} ist beschäftigt."),
            (LanguageKey::IncomingExchange, "{0} möchte mit dir handeln."),
            (LanguageKey::ExchangeDeclined, "Der Handel mit {0} wurde abgelehnt."),
            (LanguageKey::InventoryFull, "Dein Inventar ist voll."),
            (LanguageKey::InvalidAmount, "Ungültige Menge."),
        ] {
            language.set(key, RegionType::De, text);
        }
        for (key, text) in [
            (LanguageKey::Welcome, "Bienvenue, {0}."),
            (LanguageKey::IncomingExchange, "{0} souhaite échanger avec vous."),
            (LanguageKey::InventoryFull, "Votre inventaire est plein."),
        ] {
            language.set(key, RegionType::Fr, text);
        }
        language
    }

    /// No translations at all: every region reads English.
    pub fn english_only() -> Self {
        Self {
            texts: HashMap::new(),
        }
    }

    /// Overrides the text of `key` for `region`.
    pub fn set(&mut self, key: LanguageKey, region: RegionType, text: impl Into<String>) {
        self.texts.insert((key, region), text.into());
    }

    pub fn get(&self, key: LanguageKey, region: RegionType) -> &str {
        self.texts
            .get(&(key, region))
            .or_else(|| self.texts.get(&(key, RegionType::En)))
            .map_or(key.english(), String::as_str)
    }

    /// Resolves `key` and fills its positional placeholders.
    pub fn format(&self, key: LanguageKey, region: RegionType, args: &[&str]) -> String {
        let mut text = self.get(key, region).to_owned();
        for (index, arg) in args.iter().enumerate() {
            text = text.replace(&format!("{{{index}}}"), arg);
        }
        text
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_uses_region_text() {
        let language = Language::new();
        assert_eq!(
            language.get(LanguageKey::InvalidAmount, RegionType::De),
            "Ungültige Menge."
        );
    }

    #[test]
    fn test_get_falls_back_to_english() {
        let language = Language::new();
        assert_eq!(
            language.get(LanguageKey::NoPortal, RegionType::Es),
            "There is no portal here."
        );
        assert_eq!(
            language.get(LanguageKey::NoPortal, RegionType::De),
            "There is no portal here."
        );
    }

    #[test]
    fn test_english_override_applies_to_untranslated_regions() {
        let mut language = Language::english_only();
        language.set(LanguageKey::NoPortal, RegionType::En, "No way out.");
        assert_eq!(language.get(LanguageKey::NoPortal, RegionType::Fr), "No way out.");
    }

    #[test]
    fn test_format_fills_placeholders() {
        let language = Language::new();
        assert_eq!(
            language.format(LanguageKey::IncomingExchange, RegionType::En, &["Mira"]),
            "Mira wants to trade with you."
        );
        assert_eq!(
            language.format(LanguageKey::Welcome, RegionType::Fr, &["Mira"]),
            "Bienvenue, Mira."
        );
    }
}
