//! Code 128 symbol encoding (subsets B and C).

use crate::error::RenderError;

/// Bar/space widths for symbol values 0..=105 plus the stop pattern.
const PATTERNS: [&str; 107] = [
    "212222", "222122", "222221", "121223", "121322", "131222", "122213", "122312", "132212",
    "221213", "221312", "231212", "112232", "122132", "122231", "113222", "123122", "123221",
    "223211", "221132", "221231", "213212", "223112", "312131", "311222", "321122", "321221",
    "312212", "322112", "322211", "212123", "212321", "232121", "111323", "131123", "131321",
    "112313", "132113", "132311", "211313", "231113", "231311", "112133", "112331", "132131",
    "113123", "113321", "133121", "313121", "211331", "231131", "213113", "213311", "213131",
    "311123", "311321", "331121", "312113", "312311", "332111", "314111", "221411", "431111",
    "111224", "111422", "121124", "121421", "141122", "141221", "112214", "112412", "122114",
    "122411", "142112", "142211", "241211", "221114", "413111", "241112", "134111", "111242",
    "121142", "121241", "114212", "124112", "124211", "411212", "421112", "421211", "212141",
    "214121", "412121", "111143", "111341", "131141", "114113", "114311", "411113", "411311",
    "113141", "114131", "311141", "411131", "211412", "211214", "211232", "2331112",
];

const START_B: u8 = 104;
const START_C: u8 = 105;
const STOP: usize = 106;

/// Requested starting subset, from ZPL invocation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    Auto,
    B,
    C,
}

/// Splits ZPL `>:` / `>;` invocation prefixes off barcode data.
pub fn split_invocation(data: &str) -> (Subset, &str) {
    if let Some(rest) = data.strip_prefix(">;") {
        (Subset::C, rest)
    } else if let Some(rest) = data.strip_prefix(">:") {
        (Subset::B, rest)
    } else {
        (Subset::Auto, data)
    }
}

fn use_subset_c(data: &str, requested: Subset) -> bool {
    let numeric = !data.is_empty() && data.len() % 2 == 0 && data.bytes().all(|b| b.is_ascii_digit());
    match requested {
        Subset::C => numeric,
        Subset::B => false,
        Subset::Auto => numeric && data.len() >= 4,
    }
}

/// Symbol values including start, checksum and stop.
pub fn symbol_values(data: &str, subset: Subset) -> Result<Vec<u8>, RenderError> {
    if data.is_empty() {
        return Err(RenderError::MalformedInput(
            "Code 128 field has no data".to_string(),
        ));
    }

    let mut values = Vec::with_capacity(data.len() + 3);
    if use_subset_c(data, subset) {
        values.push(START_C);
        for pair in data.as_bytes().chunks(2) {
            values.push((pair[0] - b'0') * 10 + (pair[1] - b'0'));
        }
    } else {
        values.push(START_B);
        for c in data.chars() {
            if !(' '..='\u{7f}').contains(&c) {
                return Err(RenderError::MalformedInput(format!(
                    "character {:?} cannot be encoded in Code 128",
                    c
                )));
            }
            values.push(c as u8 - b' ');
        }
    }

    let checksum = values
        .iter()
        .enumerate()
        .map(|(i, v)| i.max(1) as u32 * *v as u32)
        .sum::<u32>()
        % 103;
    values.push(checksum as u8);
    values.push(STOP as u8);
    Ok(values)
}

/// Encodes `data` as a module sequence, `true` for a bar.
pub fn encode(data: &str, subset: Subset) -> Result<Vec<bool>, RenderError> {
    let values = symbol_values(data, subset)?;
    let mut modules = Vec::with_capacity(values.len() * 11 + 2);
    for value in values {
        let pattern = PATTERNS[value as usize];
        for (i, width) in pattern.bytes().enumerate() {
            let bar = i % 2 == 0;
            for _ in 0..(width - b'0') {
                modules.push(bar);
            }
        }
    }
    Ok(modules)
}
