//! Address roles and mailboxes (RFC 5322 §3.4).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{MailError, Result};
use crate::mime::header::encode_word;

const MAX_LINE_LEN: usize = 78;

/// The address header fields a message can carry.
///
/// Declaration order is the order in which the headers are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressRole {
    Sender,
    From,
    To,
    Cc,
    Bcc,
    ReplyTo,
    FollowupTo,
}

impl AddressRole {
    /// Every role, in header emission order.
    pub const ALL: [AddressRole; 7] = [
        AddressRole::Sender,
        AddressRole::From,
        AddressRole::To,
        AddressRole::Cc,
        AddressRole::Bcc,
        AddressRole::ReplyTo,
        AddressRole::FollowupTo,
    ];

    /// Roles whose addresses receive the message at the transport level.
    pub const RECIPIENTS: [AddressRole; 3] = [AddressRole::To, AddressRole::Cc, AddressRole::Bcc];

    /// Header field name as written on the wire.
    pub fn header_name(self) -> &'static str {
        match self {
            AddressRole::Sender => "Sender",
            AddressRole::From => "From",
            AddressRole::To => "To",
            AddressRole::Cc => "Cc",
            AddressRole::Bcc => "Bcc",
            AddressRole::ReplyTo => "Reply-To",
            AddressRole::FollowupTo => "Followup-To",
        }
    }
}

impl fmt::Display for AddressRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_name())
    }
}

impl FromStr for AddressRole {
    type Err = MailError;

    /// Accepts the role names case-insensitively, with or without the hyphen
    /// (`ReplyTo` and `Reply-To` both work). Anything else is `InvalidField`.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "sender" => Ok(AddressRole::Sender),
            "from" => Ok(AddressRole::From),
            "to" => Ok(AddressRole::To),
            "cc" => Ok(AddressRole::Cc),
            "bcc" => Ok(AddressRole::Bcc),
            "replyto" => Ok(AddressRole::ReplyTo),
            "followupto" => Ok(AddressRole::FollowupTo),
            _ => Err(MailError::InvalidField(s.to_string())),
        }
    }
}

/// A display name plus address pair.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl Mailbox {
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            address: address.into(),
        }
    }

    /// Parse a single mailbox from user input.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    let address = trimmed[angle_start + 1..angle_end].trim().to_string();
                    let display_name = strip_quotes(&trimmed[..angle_start]);
                    return Self {
                        display_name,
                        address,
                    };
                }
            }
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Parse a comma-separated list of mailboxes.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    let mailbox = Self::parse(&current);
                    if !mailbox.address.is_empty() {
                        results.push(mailbox);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        let mailbox = Self::parse(&current);
        if !mailbox.address.is_empty() {
            results.push(mailbox);
        }

        results
    }

    /// Format for a header value.
    ///
    /// The display name is left bare when it is a run of atoms and quoted
    /// when it contains specials. Names that are not ASCII or that carry
    /// control characters are RFC 2047 encoded, so a CR or LF never reaches
    /// the header block. Control characters are dropped from the address.
    pub fn to_header_value(&self) -> String {
        let address: String = self.address.chars().filter(|c| !c.is_control()).collect();
        if self.display_name.is_empty() {
            return address;
        }
        let name = if !self.display_name.is_ascii()
            || self.display_name.chars().any(|c| c.is_control())
        {
            encode_word(&self.display_name)
        } else if self.display_name.chars().all(is_phrase_char) {
            self.display_name.clone()
        } else {
            quote(&self.display_name)
        };
        format!("{name} <{address}>")
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            f.write_str(&self.address)
        } else {
            write!(f, "{} <{}>", self.display_name, self.address)
        }
    }
}

/// atext plus the space between words of a phrase.
fn is_phrase_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ' ' || "!#$%&'*+-/=?^_`{|}~".contains(c)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Join mailboxes with `, `, breaking the line after a comma when the next
/// mailbox would push it past 78 columns.
fn fold_list(name: &str, mailboxes: &[Mailbox]) -> String {
    let mut value = String::new();
    let mut column = name.len() + 2;
    for (i, mailbox) in mailboxes.iter().enumerate() {
        let item = mailbox.to_header_value();
        let first_line = item.split("\r\n").next().unwrap_or_default();
        if i > 0 {
            if column + 2 + first_line.len() > MAX_LINE_LEN {
                value.push_str(",\r\n ");
                column = 1;
            } else {
                value.push_str(", ");
                column += 2;
            }
        }
        column = match item.rfind("\r\n") {
            Some(pos) => item.len() - pos - 2,
            None => column + item.len(),
        };
        value.push_str(&item);
    }
    value
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// The address map of a message: role → ordered mailboxes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Addresses {
    entries: BTreeMap<AddressRole, Vec<Mailbox>>,
}

impl Addresses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mailbox to the given role.
    pub fn add(&mut self, role: AddressRole, mailbox: Mailbox) {
        self.entries.entry(role).or_default().push(mailbox);
    }

    /// Append a mailbox under a role given by name.
    ///
    /// Unknown role names fail with `InvalidField` and leave the map untouched.
    pub fn add_by_name(&mut self, role: &str, mailbox: Mailbox) -> Result<()> {
        let role: AddressRole = role.parse()?;
        self.add(role, mailbox);
        Ok(())
    }

    /// Mailboxes stored under `role`, in insertion order.
    pub fn get(&self, role: AddressRole) -> &[Mailbox] {
        self.entries.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `true` if no role holds any mailbox.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    /// Addresses of every To, Cc and Bcc mailbox, in that role order.
    pub fn recipients(&self) -> Vec<String> {
        AddressRole::RECIPIENTS
            .iter()
            .flat_map(|role| self.get(*role))
            .map(|m| m.address.clone())
            .collect()
    }

    /// The transport-level sender: first `Sender`, else first `From`.
    pub fn effective_sender(&self) -> Result<&Mailbox> {
        self.get(AddressRole::Sender)
            .first()
            .or_else(|| self.get(AddressRole::From).first())
            .ok_or(MailError::NoSender)
    }

    /// Header lines for every populated role, in emission order.
    pub fn header_fields(&self) -> Vec<(&'static str, String)> {
        AddressRole::ALL
            .iter()
            .filter_map(|role| {
                let mailboxes = self.get(*role);
                if mailboxes.is_empty() {
                    return None;
                }
                Some((role.header_name(), fold_list(role.header_name(), mailboxes)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!("From".parse::<AddressRole>().unwrap(), AddressRole::From);
        assert_eq!("bcc".parse::<AddressRole>().unwrap(), AddressRole::Bcc);
        assert_eq!(
            "Reply-To".parse::<AddressRole>().unwrap(),
            AddressRole::ReplyTo
        );
        assert_eq!(
            "FollowupTo".parse::<AddressRole>().unwrap(),
            AddressRole::FollowupTo
        );
    }

    #[test]
    fn test_role_from_str_rejects_unknown() {
        let err = "X-Mailer".parse::<AddressRole>().unwrap_err();
        assert!(matches!(err, MailError::InvalidField(f) if f == "X-Mailer"));
    }

    #[test]
    fn test_add_by_name_invalid_leaves_map_unchanged() {
        let mut addrs = Addresses::new();
        addrs.add(AddressRole::To, Mailbox::new("", "b@y.com"));
        let before = addrs.clone();

        let err = addrs
            .add_by_name("Resent-To", Mailbox::new("", "c@z.com"))
            .unwrap_err();
        assert!(matches!(err, MailError::InvalidField(_)));
        assert_eq!(addrs, before);
    }

    #[test]
    fn test_effective_sender_prefers_sender() {
        let mut addrs = Addresses::new();
        addrs.add(AddressRole::From, Mailbox::new("", "from@x.com"));
        assert_eq!(addrs.effective_sender().unwrap().address, "from@x.com");

        addrs.add(AddressRole::Sender, Mailbox::new("", "sender@x.com"));
        assert_eq!(addrs.effective_sender().unwrap().address, "sender@x.com");
    }

    #[test]
    fn test_effective_sender_none() {
        let mut addrs = Addresses::new();
        addrs.add(AddressRole::To, Mailbox::new("", "b@y.com"));
        assert!(matches!(addrs.effective_sender(), Err(MailError::NoSender)));
    }

    #[test]
    fn test_recipients_order() {
        let mut addrs = Addresses::new();
        addrs.add(AddressRole::Bcc, Mailbox::new("", "bcc@z.com"));
        addrs.add(AddressRole::Cc, Mailbox::new("", "cc@z.com"));
        addrs.add(AddressRole::To, Mailbox::new("Bob", "to1@z.com"));
        addrs.add(AddressRole::To, Mailbox::new("", "to2@z.com"));
        addrs.add(AddressRole::From, Mailbox::new("", "a@x.com"));
        assert_eq!(
            addrs.recipients(),
            vec!["to1@z.com", "to2@z.com", "cc@z.com", "bcc@z.com"]
        );
    }

    #[test]
    fn test_header_fields_fixed_order() {
        let mut addrs = Addresses::new();
        addrs.add(AddressRole::ReplyTo, Mailbox::new("", "r@x.com"));
        addrs.add(AddressRole::To, Mailbox::new("", "b@y.com"));
        addrs.add(AddressRole::To, Mailbox::new("", "c@y.com"));
        addrs.add(AddressRole::From, Mailbox::new("", "a@x.com"));
        let fields = addrs.header_fields();
        assert_eq!(
            fields,
            vec![
                ("From", "a@x.com".to_string()),
                ("To", "b@y.com, c@y.com".to_string()),
                ("Reply-To", "r@x.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_value_quoting() {
        assert_eq!(
            Mailbox::new("User One", "a@b.com").to_header_value(),
            "User One <a@b.com>"
        );
        assert_eq!(
            Mailbox::new("Last, First", "a@b.com").to_header_value(),
            "\"Last, First\" <a@b.com>"
        );
        assert_eq!(
            Mailbox::new("Say \"hi\"", "a@b.com").to_header_value(),
            "\"Say \\\"hi\\\"\" <a@b.com>"
        );
        assert_eq!(
            Mailbox::new("Jürgen", "j@b.de").to_header_value(),
            "=?utf-8?b?SsO8cmdlbg==?= <j@b.de>"
        );
    }

    #[test]
    fn test_header_value_control_chars_cannot_inject() {
        let value = Mailbox::new("Evil\r\nBcc: victim@z.com", "a@x.com").to_header_value();
        assert!(!value.contains('\r') && !value.contains('\n'), "{value:?}");
        assert!(value.starts_with("=?utf-8?b?"));
        assert!(value.ends_with(" <a@x.com>"));

        let value = Mailbox::new("", "a@x.com\r\nBcc: victim@z.com").to_header_value();
        assert_eq!(value, "a@x.comBcc: victim@z.com");

        let value = Mailbox::new("Tab\tName", "a@x.com").to_header_value();
        assert!(value.starts_with("=?utf-8?b?"));
    }

    #[test]
    fn test_long_address_lists_fold_after_comma() {
        let mut addrs = Addresses::new();
        for i in 0..6 {
            addrs.add(
                AddressRole::To,
                Mailbox::new(format!("Recipient Number {i}"), format!("recipient{i}@example.com")),
            );
        }
        let fields = addrs.header_fields();
        let (name, value) = &fields[0];
        let line = format!("{name}: {value}");
        assert!(line.contains(",\r\n "));
        for physical in line.split("\r\n") {
            assert!(physical.len() <= MAX_LINE_LEN, "{physical:?}");
        }
        let unfolded = value.replace("\r\n", "");
        assert_eq!(unfolded.matches(", ").count(), 5);
    }

    #[test]
    fn test_parse_name_and_address() {
        let m = Mailbox::parse("User One <user1@example.com>");
        assert_eq!(m.address, "user1@example.com");
        assert_eq!(m.display_name, "User One");
    }

    #[test]
    fn test_parse_list_with_quoted_comma() {
        let list = Mailbox::parse_list("\"Last, First\" <a@b.com>, other@c.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name, "Last, First");
        assert_eq!(list[1].address, "other@c.com");
    }
}
