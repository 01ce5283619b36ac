//! Formatting and table type definitions.

/// Sentinel for an unset font or color index.
pub const UNSET_INDEX: i32 = -1;

/// Character formatting attributes.
///
/// Value semantics; copied into the group frame on every `{` and attached
/// immutably to each text run. Unset numeric fields use `0` for the font
/// size and [`UNSET_INDEX`] for table references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub superscript: bool,
    pub subscript: bool,
    pub hidden: bool,
    pub smallcaps: bool,
    pub allcaps: bool,
    /// Font size in half-points, 0 = unset
    pub font_size: u16,
    /// Index into the font table, [`UNSET_INDEX`] = unset
    pub font: i32,
    /// Index into the color table, [`UNSET_INDEX`] = unset
    pub foreground_color: i32,
    /// Index into the color table, [`UNSET_INDEX`] = unset
    pub background_color: i32,
}

impl Default for CharacterFormat {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            strike: false,
            superscript: false,
            subscript: false,
            hidden: false,
            smallcaps: false,
            allcaps: false,
            font_size: 0,
            font: UNSET_INDEX,
            foreground_color: UNSET_INDEX,
            background_color: UNSET_INDEX,
        }
    }
}

impl CharacterFormat {
    /// Whether every attribute is at its default.
    #[inline]
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Right,
    Center,
    Justify,
}

/// Paragraph formatting attributes.
///
/// All distances are in twips (1/1440 inch). Value semantics; copied into
/// the group frame on every `{`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParagraphFormat {
    pub alignment: Alignment,
    /// First-line indent
    pub first_indent: i32,
    pub left_indent: i32,
    pub right_indent: i32,
    pub space_before: i32,
    pub space_after: i32,
    /// Set by `\intbl`; routes content into the current table cell
    pub in_table: bool,
}

/// An RGB color table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    #[inline]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Pack into `0xRRGGBB`.
    #[inline]
    pub const fn to_rgb(self) -> u32 {
        ((self.red as u32) << 16) | ((self.green as u32) << 8) | self.blue as u32
    }
}

/// Color table. Index 0 is conventionally the "auto" entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorTable {
    colors: Vec<Color>,
}

impl ColorTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a color and return its index.
    #[inline]
    pub fn push(&mut self, color: Color) -> i32 {
        let index = self.colors.len() as i32;
        self.colors.push(color);
        index
    }

    /// Look up a color by index. Negative or out-of-range indices yield
    /// `None`.
    #[inline]
    pub fn get(&self, index: i32) -> Option<Color> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.colors.get(i).copied())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Color> {
        self.colors.iter()
    }
}

/// Font family categories declared in the font table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontFamily {
    /// Unknown or default
    #[default]
    Nil,
    /// Serif
    Roman,
    /// Sans-serif
    Swiss,
    /// Monospace
    Modern,
    Script,
    Decor,
    /// Technical, symbol, and mathematical fonts
    Tech,
}

/// A font table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontEntry<'a> {
    /// Index declared by `\fN`
    pub index: i32,
    /// Font name, arena-owned
    pub name: &'a str,
    pub family: FontFamily,
    /// Windows charset declared by `\fcharset`
    pub charset: i32,
}

impl<'a> FontEntry<'a> {
    #[inline]
    pub fn new(index: i32, name: &'a str, family: FontFamily, charset: i32) -> Self {
        Self {
            index,
            name,
            family,
            charset,
        }
    }

    fn placeholder(index: i32) -> Self {
        Self::new(index, "", FontFamily::Nil, 0)
    }

    /// Whether this slot was declared rather than synthesized to fill a
    /// sparse index range.
    #[inline]
    pub fn is_declared(&self) -> bool {
        !self.name.is_empty() || self.family != FontFamily::Nil || self.charset != 0
    }
}

/// Font table with sparse insertion by declared index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontTable<'a> {
    fonts: Vec<FontEntry<'a>>,
}

impl<'a> FontTable<'a> {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry at its declared index, growing the table with
    /// placeholders as needed.
    pub fn insert(&mut self, entry: FontEntry<'a>) {
        let Ok(index) = usize::try_from(entry.index) else {
            return;
        };
        if index >= self.fonts.len() {
            let mut next = self.fonts.len() as i32;
            self.fonts.resize_with(index + 1, || {
                let slot = FontEntry::placeholder(next);
                next += 1;
                slot
            });
        }
        self.fonts[index] = entry;
    }

    /// Look up a font by index. Negative or out-of-range indices yield
    /// `None`.
    #[inline]
    pub fn get(&self, index: i32) -> Option<&FontEntry<'a>> {
        usize::try_from(index).ok().and_then(|i| self.fonts.get(i))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &FontEntry<'a>> {
        self.fonts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_is_unset() {
        let fmt = CharacterFormat::default();
        assert!(fmt.is_plain());
        assert_eq!(fmt.font, UNSET_INDEX);
        assert_eq!(fmt.font_size, 0);
        assert_eq!(fmt.foreground_color, UNSET_INDEX);
    }

    #[test]
    fn test_color_packing() {
        assert_eq!(Color::new(0x12, 0x34, 0x56).to_rgb(), 0x123456);
        assert_eq!(Color::new(255, 255, 255).to_rgb(), 0xFFFFFF);
    }

    #[test]
    fn test_color_table_lookup() {
        let mut table = ColorTable::new();
        assert_eq!(table.push(Color::default()), 0);
        assert_eq!(table.push(Color::new(255, 0, 0)), 1);
        assert_eq!(table.get(1), Some(Color::new(255, 0, 0)));
        assert_eq!(table.get(-1), None);
        assert_eq!(table.get(2), None);
    }

    #[test]
    fn test_font_table_sparse_insert() {
        let mut table = FontTable::new();
        table.insert(FontEntry::new(3, "Arial", FontFamily::Swiss, 0));
        assert_eq!(table.len(), 4);
        assert!(!table.get(0).unwrap().is_declared());
        let arial = table.get(3).unwrap();
        assert_eq!(arial.name, "Arial");
        assert!(arial.is_declared());
        assert_eq!(table.get(4), None);
    }
}
