//! Label description produced by the parser, in printer dots.

use super::code128::Subset;

/// Field rotation, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    Rotated,
    Inverted,
    Bottom,
}

impl Orientation {
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'N' => Some(Orientation::Normal),
            'R' => Some(Orientation::Rotated),
            'I' => Some(Orientation::Inverted),
            'B' => Some(Orientation::Bottom),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Normal => 0,
            Orientation::Rotated => 90,
            Orientation::Inverted => 180,
            Orientation::Bottom => 270,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Font {
    /// `0` is the scalable font, `A`..`Z` are bitmap fonts.
    pub name: char,
    pub height: u32,
    pub width: u32,
}

impl Default for Font {
    fn default() -> Self {
        Font {
            name: 'A',
            height: 9,
            width: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Justify {
    #[default]
    Left,
    Center,
    Right,
    Justified,
}

impl Justify {
    pub fn from_code(code: &str) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "C" => Justify::Center,
            "R" => Justify::Right,
            "J" => Justify::Justified,
            _ => Justify::Left,
        }
    }
}

/// `^FB` text wrapping box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldBlock {
    pub width: u32,
    pub max_lines: u32,
    pub line_spacing: i32,
    pub justify: Justify,
}

/// Field position after `^LH` has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Origin {
    pub x: u32,
    pub y: u32,
    /// `^FT` positions the text baseline instead of the top-left corner.
    pub baseline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineColor {
    #[default]
    Black,
    White,
}

impl LineColor {
    pub fn from_code(code: &str) -> Self {
        if code.eq_ignore_ascii_case("W") {
            LineColor::White
        } else {
            LineColor::Black
        }
    }

    pub fn as_svg(self) -> &'static str {
        match self {
            LineColor::Black => "black",
            LineColor::White => "white",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextField {
    pub origin: Origin,
    pub font: Font,
    pub orientation: Orientation,
    pub text: String,
    pub block: Option<FieldBlock>,
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Barcode {
    pub origin: Origin,
    pub orientation: Orientation,
    pub module_width: u32,
    pub height: u32,
    pub interpretation: bool,
    pub interpretation_above: bool,
    pub subset: Subset,
    pub data: String,
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicBox {
    pub origin: Origin,
    pub width: u32,
    pub height: u32,
    pub thickness: u32,
    pub color: LineColor,
    /// Corner rounding, 0 (square) to 8.
    pub rounding: u32,
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicCircle {
    pub origin: Origin,
    pub diameter: u32,
    pub thickness: u32,
    pub color: LineColor,
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(TextField),
    Barcode(Barcode),
    Box(GraphicBox),
    Circle(GraphicCircle),
}

/// One `^XA … ^XZ` block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Label {
    pub elements: Vec<Element>,
}

/// All labels of a submission, in input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedDocument {
    pub labels: Vec<Label>,
    pub warnings: Vec<String>,
}
