//! Access restrictions
//!
//! A garden may declare restrictions such as "EU access only". When a shoot
//! carries a matching restriction the user is shown a notice and, for
//! credential-bearing commands, has to confirm before anything is emitted.

use crate::garden::types::Shoot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, Write};

const LEGACY_EU_ACCESS_KEY: &str = "seed.gardener.cloud/eu-access";
const EU_ACCESS_KEY: &str = "eu-access-only";

/// Configured restriction rule of a garden
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRestriction {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_if: Option<bool>,
    #[serde(default, alias = "message", skip_serializing_if = "String::is_empty")]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<AccessRestrictionOption>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRestrictionOption {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_if: Option<bool>,
    #[serde(default, alias = "message", skip_serializing_if = "String::is_empty")]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

fn expected_value(value: &Option<String>, notify_if: Option<bool>) -> String {
    match (value, notify_if) {
        (Some(v), _) => v.clone(),
        (None, Some(b)) => b.to_string(),
        (None, None) => "true".to_string(),
    }
}

/// Boolean parsing with the spellings Kubernetes annotations commonly use
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn value_matches(actual: &str, expected: &str) -> bool {
    match (parse_bool(actual), parse_bool(expected)) {
        (Some(a), Some(e)) => a == e,
        _ => actual == expected,
    }
}

fn map_legacy_key(key: &str) -> &str {
    if key == LEGACY_EU_ACCESS_KEY {
        EU_ACCESS_KEY
    } else {
        key
    }
}

impl AccessRestriction {
    fn header(&self) -> String {
        if !self.msg.is_empty() {
            return self.msg.clone();
        }
        self.display_name.clone().unwrap_or_else(|| self.key.clone())
    }

    fn option_items(&self, values: &BTreeMap<String, String>) -> Vec<String> {
        self.options
            .iter()
            .filter(|o| {
                values
                    .get(&o.key)
                    .is_some_and(|v| value_matches(v, &expected_value(&o.value, o.notify_if)))
            })
            .map(|o| {
                if o.msg.is_empty() {
                    o.display_name.clone().unwrap_or_else(|| o.key.clone())
                } else {
                    o.msg.clone()
                }
            })
            .collect()
    }

    fn check(&self, shoot: &Shoot) -> Option<AccessRestrictionMessage> {
        let key = map_legacy_key(&self.key);

        // Restrictions declared in the shoot spec take precedence
        if let Some(entry) = shoot.spec.access_restrictions.iter().find(|r| r.name == key) {
            return Some(AccessRestrictionMessage {
                header: self.header(),
                items: self.option_items(&entry.options),
            });
        }

        let expected = expected_value(&self.value, self.notify_if);
        let labels = shoot.metadata.labels.as_ref();
        let annotations = shoot.metadata.annotations.as_ref();
        let hit = [labels, annotations]
            .into_iter()
            .flatten()
            .filter_map(|m| m.get(&self.key))
            .any(|v| value_matches(v, &expected));
        if !hit {
            return None;
        }

        let empty = BTreeMap::new();
        Some(AccessRestrictionMessage {
            header: self.header(),
            items: self.option_items(annotations.unwrap_or(&empty)),
        })
    }
}

/// Evaluate every rule against the shoot, in rule order
pub fn check_access_restrictions(rules: &[AccessRestriction], shoot: &Shoot) -> AccessRestrictionMessages {
    AccessRestrictionMessages(rules.iter().filter_map(|r| r.check(shoot)).collect())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessRestrictionMessage {
    pub header: String,
    pub items: Vec<String>,
}

impl AccessRestrictionMessage {
    fn width(&self) -> usize {
        let items = self
            .items
            .iter()
            .flat_map(|t| t.lines())
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0)
            + 2;
        self.header
            .lines()
            .map(|l| l.chars().count())
            .fold(items, usize::max)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccessRestrictionMessages(pub Vec<AccessRestrictionMessage>);

#[derive(Clone, Copy)]
enum Row {
    Header,
    Body,
    Footer,
}

impl Row {
    fn line(self, text: &str, width: usize) -> String {
        let pad = width.saturating_sub(text.chars().count());
        match self {
            Row::Header => format!("┌─{}{}─┐", text, "─".repeat(pad)),
            Row::Footer => format!("└─{}{}─┘", text, "─".repeat(pad)),
            Row::Body => format!("│ {}{} │", text, " ".repeat(pad)),
        }
    }

    fn print(self, text: &str, width: usize) -> String {
        let bullet = text.starts_with("* ");
        text.split('\n')
            .enumerate()
            .map(|(i, line)| {
                if bullet && i > 0 {
                    self.line(&format!("  {line}"), width)
                } else {
                    self.line(line, width)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl AccessRestrictionMessages {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Boxed notice, one line per row, trailing newline included
    pub fn render(&self) -> String {
        let mut title = String::from(" Access Restriction");
        if self.0.len() > 1 {
            title.push('s');
        }
        title.push(' ');

        let width = self
            .0
            .iter()
            .map(AccessRestrictionMessage::width)
            .fold(title.chars().count(), usize::max);

        let mut out = String::new();
        out.push_str(&Row::Header.print(&title, width));
        out.push('\n');
        for m in &self.0 {
            out.push_str(&Row::Body.print(&m.header, width));
            out.push('\n');
            for item in &m.items {
                out.push_str(&Row::Body.print(&format!("* {item}"), width));
                out.push('\n');
            }
        }
        out.push_str(&Row::Footer.print("", width));
        out.push('\n');
        out
    }

    /// Plain text form, used where no box drawing is wanted
    pub fn to_plain_text(&self) -> String {
        let mut lines = Vec::new();
        for m in &self.0 {
            lines.push(m.header.clone());
            lines.extend(m.items.iter().map(|i| format!("* {i}")));
        }
        lines.join("\n")
    }

    /// Ask until the user answers; an empty answer or EOF declines
    pub fn confirm<R: BufRead, W: Write>(&self, reader: &mut R, writer: &mut W) -> std::io::Result<bool> {
        loop {
            write!(writer, "Do you want to continue? [y/N]: ")?;
            writer.flush()?;

            let mut answer = String::new();
            let read = reader.read_line(&mut answer)?;
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "" | "n" | "no" => return Ok(false),
                _ if read == 0 => return Ok(false),
                _ => continue,
            }
        }
    }

    /// Render the notice and optionally ask for confirmation. No messages means no restriction.
    pub fn handle<R: BufRead, W: Write>(&self, reader: &mut R, writer: &mut W, ask: bool) -> std::io::Result<bool> {
        if self.is_empty() {
            return Ok(true);
        }
        write!(writer, "{}", self.render())?;
        if !ask {
            return Ok(true);
        }
        self.confirm(reader, writer)
    }
}

impl fmt::Display for AccessRestrictionMessages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
