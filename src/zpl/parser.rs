//! Groups ZPL commands into labels and lays out their fields.

use super::code128::{self, Subset};
use super::lexer::{tokenize, Command, Prefix};
use super::model::*;
use super::InstructionPolicy;
use crate::error::RenderError;
use tracing::debug;

/// Commands that configure the printer but do not affect page content.
const SETUP_COMMANDS: &[&str] = &[
    "CI", "PW", "LL", "PR", "MD", "MN", "MT", "MM", "PO", "PQ", "LR", "LS", "LT", "JM", "PM",
    "CC", "CT", "CD", "JU", "MU", "SZ", "FX",
];

/// Control commands accepted anywhere.
const CONTROL_COMMANDS: &[&str] = &["SD", "TA", "JA", "JS", "JC", "JD", "JE", "JR", "PS"];

#[derive(Debug, Clone, Copy)]
struct BarcodeDefaults {
    module_width: u32,
    height: u32,
}

impl Default for BarcodeDefaults {
    fn default() -> Self {
        BarcodeDefaults {
            module_width: 2,
            height: 10,
        }
    }
}

/// Format-wide settings, reset at every `^XA`.
#[derive(Debug, Default)]
struct Defaults {
    font: Font,
    orientation: Orientation,
    home: (u32, u32),
    barcode: BarcodeDefaults,
}

#[derive(Debug, Clone)]
enum FieldKind {
    Text,
    Barcode {
        orientation: Option<Orientation>,
        height: Option<u32>,
        interpretation: bool,
        interpretation_above: bool,
    },
    Box {
        width: u32,
        height: u32,
        thickness: u32,
        color: LineColor,
        rounding: u32,
    },
    Circle {
        diameter: u32,
        thickness: u32,
        color: LineColor,
    },
}

/// Settings accumulated between `^FO` and `^FS`.
#[derive(Debug, Clone)]
struct Field {
    origin: Option<Origin>,
    font: Option<(Font, Option<Orientation>)>,
    kind: FieldKind,
    data: Option<String>,
    hex_indicator: Option<char>,
    block: Option<FieldBlock>,
    reverse: bool,
    suppressed: bool,
}

impl Default for Field {
    fn default() -> Self {
        Field {
            origin: None,
            font: None,
            kind: FieldKind::Text,
            data: None,
            hex_indicator: None,
            block: None,
            reverse: false,
            suppressed: false,
        }
    }
}

impl Field {
    fn is_empty(&self) -> bool {
        self.data.is_none() && matches!(self.kind, FieldKind::Text)
    }
}

/// Largest numeric parameter a ZPL command accepts, in dots.
const MAX_PARAM: u32 = 32000;

fn num(args: &[&str], index: usize) -> Option<u32> {
    args.get(index)
        .and_then(|a| a.parse::<f32>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| (v.round() as u32).min(MAX_PARAM))
}

fn int(args: &[&str], index: usize) -> Option<i32> {
    args.get(index).and_then(|a| a.parse::<i32>().ok())
}

fn flag(args: &[&str], index: usize, default: bool) -> bool {
    match args.get(index).map(|a| a.to_ascii_uppercase()) {
        Some(a) if a == "Y" => true,
        Some(a) if a == "N" => false,
        _ => default,
    }
}

fn orientation_arg(args: &[&str], index: usize) -> Option<Orientation> {
    args.get(index)
        .and_then(|a| a.chars().next())
        .and_then(Orientation::from_code)
}

/// Replaces `<indicator>XX` hexadecimal escapes with the bytes they denote.
fn decode_hex(data: &str, indicator: char) -> String {
    let mut bytes = Vec::with_capacity(data.len());
    let mut rest = data;
    while let Some(pos) = rest.find(indicator) {
        bytes.extend_from_slice(rest[..pos].as_bytes());
        let after = &rest[pos + indicator.len_utf8()..];
        let escaped = after
            .get(..2)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                bytes.push(byte);
                rest = &after[2..];
            }
            None => {
                bytes.extend_from_slice(indicator.to_string().as_bytes());
                rest = after;
            }
        }
    }
    bytes.extend_from_slice(rest.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

struct Parser {
    policy: InstructionPolicy,
    labels: Vec<Label>,
    warnings: Vec<String>,
    open: Option<Label>,
    defaults: Defaults,
    field: Field,
}

impl Parser {
    fn new(policy: InstructionPolicy) -> Self {
        Parser {
            policy,
            labels: Vec::new(),
            warnings: Vec::new(),
            open: None,
            defaults: Defaults::default(),
            field: Field::default(),
        }
    }

    /// 1-based number of the label being parsed or about to be parsed.
    fn label_number(&self) -> usize {
        self.labels.len() + 1
    }

    fn unsupported(&mut self, cmd: &Command) -> Result<(), RenderError> {
        match self.policy {
            InstructionPolicy::Strict => Err(RenderError::UnsupportedInstruction {
                command: cmd.name(),
                block: self.label_number(),
            }),
            InstructionPolicy::Lenient => {
                let warning = format!(
                    "label {}: skipped unsupported instruction {} at byte {}",
                    self.label_number(),
                    cmd.name(),
                    cmd.offset
                );
                debug!("{}", warning);
                self.warnings.push(warning);
                // an unknown barcode or graphic type makes the whole field meaningless
                if cmd.prefix == Prefix::Caret && (cmd.code.starts_with('B') || cmd.code.starts_with('G')) {
                    self.field.suppressed = true;
                }
                Ok(())
            }
        }
    }

    fn outside_block(&mut self, cmd: &Command) -> Result<(), RenderError> {
        if cmd.is(Prefix::Caret, "XZ") {
            return Err(RenderError::MalformedInput(format!(
                "^XZ at byte {} has no matching ^XA",
                cmd.offset
            )));
        }
        if cmd.is(Prefix::Caret, "XA") {
            self.open = Some(Label::default());
            self.defaults = Defaults::default();
            self.field = Field::default();
            return Ok(());
        }
        if cmd.prefix == Prefix::Tilde {
            if !CONTROL_COMMANDS.contains(&cmd.code.as_str()) {
                self.unsupported(cmd)?;
            }
            return Ok(());
        }
        match self.policy {
            InstructionPolicy::Strict => Err(RenderError::MalformedInput(format!(
                "{} at byte {} is outside of any ^XA/^XZ label",
                cmd.name(),
                cmd.offset
            ))),
            InstructionPolicy::Lenient => {
                self.warnings.push(format!(
                    "skipped {} at byte {} outside of any label",
                    cmd.name(),
                    cmd.offset
                ));
                Ok(())
            }
        }
    }

    fn command(&mut self, cmd: &Command) -> Result<(), RenderError> {
        if self.open.is_none() {
            return self.outside_block(cmd);
        }

        if cmd.prefix == Prefix::Tilde {
            if !CONTROL_COMMANDS.contains(&cmd.code.as_str()) {
                self.unsupported(cmd)?;
            }
            return Ok(());
        }

        let args = cmd.args();
        match cmd.code.as_str() {
            "XA" => {
                return Err(RenderError::MalformedInput(format!(
                    "label {}: ^XA at byte {} opens a new label before ^XZ",
                    self.label_number(),
                    cmd.offset
                )));
            }
            "XZ" => self.close_label()?,
            "FO" | "FT" => {
                let (hx, hy) = self.defaults.home;
                self.field.origin = Some(Origin {
                    x: num(&args, 0).unwrap_or(0).saturating_add(hx),
                    y: num(&args, 1).unwrap_or(0).saturating_add(hy),
                    baseline: cmd.code == "FT",
                });
            }
            "LH" => {
                self.defaults.home = (num(&args, 0).unwrap_or(0), num(&args, 1).unwrap_or(0));
            }
            "FW" => {
                if let Some(o) = orientation_arg(&args, 0) {
                    self.defaults.orientation = o;
                }
            }
            "A" => {
                let mut chars = cmd.params.chars();
                let name = chars.next().unwrap_or(self.defaults.font.name).to_ascii_uppercase();
                let rest: String = chars.collect();
                let rest_args: Vec<&str> = rest.split(',').map(str::trim).collect();
                let orientation = orientation_arg(&rest_args, 0);
                let height = num(&rest_args, 1).unwrap_or(self.defaults.font.height);
                let width = num(&rest_args, 2).unwrap_or(height);
                self.field.font = Some((Font { name, height, width }, orientation));
            }
            "CF" => {
                let current = self.defaults.font;
                let name = args
                    .first()
                    .and_then(|a| a.chars().next())
                    .map(|c| c.to_ascii_uppercase())
                    .unwrap_or(current.name);
                let height = num(&args, 1).unwrap_or(current.height);
                let width = num(&args, 2).unwrap_or(if num(&args, 1).is_some() { height } else { current.width });
                self.defaults.font = Font { name, height, width };
            }
            "BY" => {
                if let Some(w) = num(&args, 0) {
                    self.defaults.barcode.module_width = w.clamp(1, 10);
                }
                if let Some(h) = num(&args, 2) {
                    self.defaults.barcode.height = h.max(1);
                }
            }
            "BC" => {
                self.field.kind = FieldKind::Barcode {
                    orientation: orientation_arg(&args, 0),
                    height: num(&args, 1),
                    interpretation: flag(&args, 2, true),
                    interpretation_above: flag(&args, 3, false),
                };
            }
            "GB" => {
                let thickness = num(&args, 2).unwrap_or(1).max(1);
                self.field.kind = FieldKind::Box {
                    width: num(&args, 0).unwrap_or(thickness).max(thickness),
                    height: num(&args, 1).unwrap_or(thickness).max(thickness),
                    thickness,
                    color: args.get(3).map(|c| LineColor::from_code(c)).unwrap_or_default(),
                    rounding: num(&args, 4).unwrap_or(0).min(8),
                };
            }
            "GC" => {
                let diameter = num(&args, 0).unwrap_or(3).max(3);
                self.field.kind = FieldKind::Circle {
                    diameter,
                    thickness: num(&args, 1).unwrap_or(1).max(1),
                    color: args.get(2).map(|c| LineColor::from_code(c)).unwrap_or_default(),
                };
            }
            "FD" | "FV" => self.field.data = Some(cmd.params.clone()),
            "FH" => {
                self.field.hex_indicator = Some(cmd.params.chars().next().unwrap_or('_'));
            }
            "FR" => self.field.reverse = true,
            "FB" => {
                self.field.block = Some(FieldBlock {
                    width: num(&args, 0).unwrap_or(0),
                    max_lines: num(&args, 1).unwrap_or(1).max(1),
                    line_spacing: int(&args, 2).unwrap_or(0),
                    justify: args.get(3).map(|j| Justify::from_code(j)).unwrap_or_default(),
                });
            }
            "FS" => self.finish_field()?,
            code if SETUP_COMMANDS.contains(&code) => {}
            _ => self.unsupported(cmd)?,
        }
        Ok(())
    }

    fn finish_field(&mut self) -> Result<(), RenderError> {
        let field = std::mem::take(&mut self.field);
        if field.suppressed || field.is_empty() {
            return Ok(());
        }

        let (hx, hy) = self.defaults.home;
        let origin = field.origin.unwrap_or(Origin {
            x: hx,
            y: hy,
            baseline: false,
        });
        let data = match (field.data, field.hex_indicator) {
            (Some(data), Some(indicator)) => Some(decode_hex(&data, indicator)),
            (data, _) => data,
        };

        let element = match field.kind {
            FieldKind::Text => {
                let (font, orientation) = field.font.unwrap_or((self.defaults.font, None));
                Element::Text(TextField {
                    origin,
                    font,
                    orientation: orientation.unwrap_or(self.defaults.orientation),
                    text: data.unwrap_or_default(),
                    block: field.block,
                    reverse: field.reverse,
                })
            }
            FieldKind::Barcode {
                orientation,
                height,
                interpretation,
                interpretation_above,
            } => {
                let Some(data) = data else {
                    return Ok(());
                };
                let (subset, data) = code128::split_invocation(&data);
                let data = data.to_string();
                code128::symbol_values(&data, subset).map_err(|e| match e {
                    RenderError::MalformedInput(reason) => RenderError::MalformedInput(format!(
                        "label {}: {}",
                        self.label_number(),
                        reason
                    )),
                    other => other,
                })?;
                Element::Barcode(Barcode {
                    origin,
                    orientation: orientation.unwrap_or(self.defaults.orientation),
                    module_width: self.defaults.barcode.module_width,
                    height: height.unwrap_or(self.defaults.barcode.height),
                    interpretation,
                    interpretation_above,
                    subset,
                    data,
                    reverse: field.reverse,
                })
            }
            FieldKind::Box {
                width,
                height,
                thickness,
                color,
                rounding,
            } => Element::Box(GraphicBox {
                origin,
                width,
                height,
                thickness,
                color,
                rounding,
                reverse: field.reverse,
            }),
            FieldKind::Circle {
                diameter,
                thickness,
                color,
            } => Element::Circle(GraphicCircle {
                origin,
                diameter,
                thickness,
                color,
                reverse: field.reverse,
            }),
        };

        if let Some(label) = self.open.as_mut() {
            label.elements.push(element);
        }
        Ok(())
    }

    fn close_label(&mut self) -> Result<(), RenderError> {
        // a field left open at ^XZ is still printed
        self.finish_field()?;
        if let Some(label) = self.open.take() {
            self.labels.push(label);
        }
        Ok(())
    }

    fn finish(self) -> Result<ParsedDocument, RenderError> {
        if self.open.is_some() {
            return Err(RenderError::MalformedInput(format!(
                "label {}: ^XA has no matching ^XZ",
                self.label_number()
            )));
        }
        if self.labels.is_empty() {
            return Err(RenderError::MalformedInput(
                "no ^XA/^XZ label block found".to_string(),
            ));
        }
        Ok(ParsedDocument {
            labels: self.labels,
            warnings: self.warnings,
        })
    }
}

/// Parses a ZPL stream into labels in input order.
pub fn parse(source: &str, policy: InstructionPolicy) -> Result<ParsedDocument, RenderError> {
    let mut parser = Parser::new(policy);
    for cmd in tokenize(source) {
        parser.command(&cmd)?;
    }
    parser.finish()
}
