//! Document metadata from the `\info` destination.

/// Named metadata fields collected from the info group.
///
/// String values are arena-owned. Fields the document does not declare stay
/// `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metadata<'a> {
    pub title: Option<&'a str>,
    pub subject: Option<&'a str>,
    pub author: Option<&'a str>,
    /// Last person to modify the document
    pub operator: Option<&'a str>,
    pub keywords: Option<&'a str>,
    pub comment: Option<&'a str>,
    pub company: Option<&'a str>,
    pub version: Option<i32>,
}

/// Which info field a nested group accumulates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfoField {
    /// The outer info group itself
    #[default]
    None,
    Title,
    Subject,
    Author,
    Operator,
    Keywords,
    Comment,
    Company,
}

impl<'a> Metadata<'a> {
    /// Whether any field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Store `text` into the slot named by `field`.
    pub(crate) fn set(&mut self, field: InfoField, text: &'a str) {
        let slot = match field {
            InfoField::None => return,
            InfoField::Title => &mut self.title,
            InfoField::Subject => &mut self.subject,
            InfoField::Author => &mut self.author,
            InfoField::Operator => &mut self.operator,
            InfoField::Keywords => &mut self.keywords,
            InfoField::Comment => &mut self.comment,
            InfoField::Company => &mut self.company,
        };
        *slot = Some(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_is_empty() {
        let mut meta = Metadata::default();
        assert!(meta.is_empty());
        meta.set(InfoField::Title, "Quarterly Report");
        meta.set(InfoField::None, "discarded");
        assert!(!meta.is_empty());
        assert_eq!(meta.title, Some("Quarterly Report"));
        assert_eq!(meta.author, None);
    }
}
