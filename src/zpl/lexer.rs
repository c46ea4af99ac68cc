//! Splits a ZPL stream into commands.

/// Command prefix character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// `^` format command.
    Caret,
    /// `~` control command.
    Tilde,
}

impl Prefix {
    pub fn as_char(self) -> char {
        match self {
            Prefix::Caret => '^',
            Prefix::Tilde => '~',
        }
    }
}

/// One command with its raw parameter text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub prefix: Prefix,
    /// Uppercased command code, e.g. `FO`, `BC`, or `A` for font selection.
    pub code: String,
    pub params: String,
    /// Byte offset of the prefix in the source.
    pub offset: usize,
}

impl Command {
    /// Code with its prefix, e.g. `^FO`.
    pub fn name(&self) -> String {
        format!("{}{}", self.prefix.as_char(), self.code)
    }

    pub fn is(&self, prefix: Prefix, code: &str) -> bool {
        self.prefix == prefix && self.code == code
    }

    /// Parameters split on commas, trimmed.
    pub fn args(&self) -> Vec<&str> {
        if self.params.trim().is_empty() {
            return Vec::new();
        }
        self.params.split(',').map(str::trim).collect()
    }
}

fn is_prefix(c: char) -> bool {
    c == '^' || c == '~'
}

/// Field data runs up to the next caret; tildes are literal inside it.
fn is_data_command(code: &str) -> bool {
    matches!(code, "FD" | "FV")
}

/// Tokenizes `source`. Text before the first command is ignored.
pub fn tokenize(source: &str) -> Vec<Command> {
    let mut commands = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(_, c)) = chars.peek() {
        if is_prefix(c) {
            break;
        }
        chars.next();
    }

    while let Some((offset, c)) = chars.next() {
        let prefix = if c == '^' { Prefix::Caret } else { Prefix::Tilde };

        let mut code = String::new();
        while code.len() < 2 {
            match chars.peek() {
                Some(&(_, next)) if !is_prefix(next) && !next.is_whitespace() => {
                    code.push(next.to_ascii_uppercase());
                    chars.next();
                    // ^A takes its font name as the first parameter character
                    if prefix == Prefix::Caret && code == "A" {
                        break;
                    }
                }
                _ => break,
            }
        }

        let data = prefix == Prefix::Caret && is_data_command(&code);
        let mut params = String::new();
        while let Some(&(_, next)) = chars.peek() {
            if next == '^' || (!data && next == '~') {
                break;
            }
            params.push(next);
            chars.next();
        }

        let params = if data {
            params.trim_end_matches(['\r', '\n']).to_string()
        } else {
            params.trim().to_string()
        };

        commands.push(Command {
            prefix,
            code,
            params,
            offset,
        });
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn codes(source: &str) -> Vec<String> {
        tokenize(source).iter().map(Command::name).collect()
    }

    #[test]
    fn test_basic_block() {
        assert_eq!(
            codes("^XA\n^FO50,60^A0N,30,30^FDHi^FS\n^XZ"),
            vec!["^XA", "^FO", "^A", "^FD", "^FS", "^XZ"]
        );
    }

    #[test]
    fn test_params_and_font_name() {
        let cmds = tokenize("^XA^A0N,30,20^FO10, 20 ^XZ");
        assert_eq!(cmds[1].code, "A");
        assert_eq!(cmds[1].params, "0N,30,20");
        assert_eq!(cmds[2].args(), vec!["10", "20"]);
    }

    #[test]
    fn test_field_data_keeps_tilde_and_spaces() {
        let cmds = tokenize("^FD  a~b ^FS");
        assert_eq!(cmds[0].params, "  a~b ");
        assert_eq!(cmds.len(), 2);
    }

    #[test]
    fn test_lowercase_and_leading_noise() {
        let cmds = tokenize("garbage\n^xa~ta000^xz");
        assert_eq!(
            cmds.iter().map(Command::name).collect::<Vec<_>>(),
            vec!["^XA", "~TA", "^XZ"]
        );
        assert_eq!(cmds[1].params, "000");
        assert_eq!(cmds[0].offset, 8);
    }

    #[test]
    fn test_empty_args() {
        let cmds = tokenize("^FS");
        assert!(cmds[0].args().is_empty());
    }
}
