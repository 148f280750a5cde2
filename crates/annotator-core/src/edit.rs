//! Text edit primitives and offset bookkeeping.

use crate::{TextRange, TextSize};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TextEdit {
    pub range: TextRange,
    pub replacement: String,
}

impl TextEdit {
    pub fn new(range: TextRange, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    pub fn insert(offset: TextSize, text: impl Into<String>) -> Self {
        Self::new(TextRange::new(offset, offset), text)
    }

    pub fn delete(range: TextRange) -> Self {
        Self::new(range, "")
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EditError {
    RangeOutOfBounds { range: TextRange, text_len: TextSize },
    InvalidUtf8Boundary { offset: TextSize },
    OverlappingEdits { first: TextRange, second: TextRange },
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::RangeOutOfBounds { range, text_len } => write!(
                f,
                "edit range {range:?} is out of bounds for text length {text_len:?}"
            ),
            EditError::InvalidUtf8Boundary { offset } => {
                write!(f, "offset {offset:?} is not a UTF-8 character boundary")
            }
            EditError::OverlappingEdits { first, second } => {
                write!(f, "overlapping edits: {first:?} overlaps {second:?}")
            }
        }
    }
}

impl std::error::Error for EditError {}

/// Apply a list of edits to a text snapshot.
///
/// Edits are sorted by `(start, end)` and applied from the end of the text
/// backwards. The returned [`OffsetMap`] translates offsets in the new text
/// back to the snapshot.
pub fn apply_text_edits(text: &str, edits: &[TextEdit]) -> Result<(String, OffsetMap), EditError> {
    let mut edits = edits.to_vec();
    normalize_text_edits(text, &mut edits)?;

    let map = OffsetMap::from_normalized(&edits);
    let mut out = text.to_string();
    for edit in edits.into_iter().rev() {
        let start = usize::from(edit.range.start());
        let end = usize::from(edit.range.end());
        debug_assert!(out.is_char_boundary(start) && out.is_char_boundary(end));
        out.replace_range(start..end, &edit.replacement);
    }
    Ok((out, map))
}

/// Sort edits and check for overlaps / out-of-bounds.
pub fn normalize_text_edits(text: &str, edits: &mut Vec<TextEdit>) -> Result<(), EditError> {
    edits.sort_by_key(|e| (e.range.start(), e.range.end()));

    let text_len = TextSize::of(text);

    for edit in edits.iter() {
        if edit.range.end() > text_len {
            return Err(EditError::RangeOutOfBounds {
                range: edit.range,
                text_len,
            });
        }
        for offset in [edit.range.start(), edit.range.end()] {
            if !text.is_char_boundary(usize::from(offset)) {
                return Err(EditError::InvalidUtf8Boundary { offset });
            }
        }
    }

    for pair in edits.windows(2) {
        let (first, second) = (&pair[0], &pair[1]);
        if first.range.end() > second.range.start()
            || (first.range.is_empty() && second.range.is_empty() && first.range.start() == second.range.start())
        {
            return Err(EditError::OverlappingEdits {
                first: first.range,
                second: second.range,
            });
        }
    }

    // Coalesce adjacent edits (e.g. an insert right before a deletion).
    let mut merged: Vec<TextEdit> = Vec::with_capacity(edits.len());
    for edit in edits.drain(..) {
        if let Some(last) = merged.last_mut() {
            if last.range.end() == edit.range.start() {
                last.range = TextRange::new(last.range.start(), edit.range.end());
                last.replacement.push_str(&edit.replacement);
                continue;
            }
        }
        merged.push(edit);
    }
    *edits = merged;

    Ok(())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Shift {
    original: TextRange,
    new_len: u32,
}

/// Maps offsets of an edited text back to the text before the edit.
///
/// Offsets inside replaced text map to the start of the original range.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OffsetMap {
    shifts: Vec<Shift>,
}

impl OffsetMap {
    fn from_normalized(edits: &[TextEdit]) -> Self {
        let shifts = edits
            .iter()
            .map(|edit| Shift {
                original: edit.range,
                new_len: edit.replacement.len() as u32,
            })
            .collect();
        Self { shifts }
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    pub fn to_original(&self, offset: u32) -> u32 {
        let mut delta: i64 = 0;
        for shift in &self.shifts {
            let orig_start = u32::from(shift.original.start()) as i64;
            let orig_len = u32::from(shift.original.len()) as i64;
            let new_start = orig_start + delta;
            let offset = offset as i64;
            if offset < new_start {
                break;
            }
            if offset < new_start + shift.new_len as i64 {
                return orig_start as u32;
            }
            delta += shift.new_len as i64 - orig_len;
        }
        (offset as i64 - delta).max(0) as u32
    }

    /// One map equivalent to translating through `newer` and then `self`,
    /// where `newer` describes an edit applied after the one `self` does.
    ///
    /// Edits that cancel out leave no shift behind, so an insert followed by
    /// its removal composes to an empty map.
    pub fn then(&self, newer: &OffsetMap) -> OffsetMap {
        let older = self.copies();
        let mut composed: Vec<Unchanged> = Vec::new();
        for b in newer.copies() {
            for a in &older {
                let lo = b.old_start.max(a.new_start);
                let hi = b.old_end().min(a.new_end());
                if lo >= hi {
                    continue;
                }
                let copy = Unchanged {
                    new_start: b.new_start + (lo - b.old_start),
                    old_start: a.old_start + (lo - a.new_start),
                    len: if hi == u64::MAX { None } else { Some(hi - lo) },
                };
                match composed.last_mut() {
                    Some(last) if last.new_end() == copy.new_start && last.old_end() == copy.old_start => {
                        last.len = copy.len.map(|len| last.len.unwrap_or(0) + len);
                    }
                    _ => composed.push(copy),
                }
            }
        }

        let mut shifts = Vec::new();
        let (mut old_cursor, mut new_cursor) = (0u64, 0u64);
        for copy in composed {
            if copy.old_start > old_cursor || copy.new_start > new_cursor {
                shifts.push(Shift {
                    original: TextRange::new(TextSize::from(old_cursor as u32), TextSize::from(copy.old_start as u32)),
                    new_len: (copy.new_start - new_cursor) as u32,
                });
            }
            match copy.len {
                Some(len) => {
                    old_cursor = copy.old_start + len;
                    new_cursor = copy.new_start + len;
                }
                None => break,
            }
        }
        OffsetMap { shifts }
    }

    /// The stretches of the new text copied unchanged from the original, in
    /// order. The last one runs to the end of the text.
    fn copies(&self) -> Vec<Unchanged> {
        let mut copies = Vec::with_capacity(self.shifts.len() + 1);
        let (mut old_cursor, mut new_cursor) = (0u64, 0u64);
        for shift in &self.shifts {
            let start = u64::from(u32::from(shift.original.start()));
            if start > old_cursor {
                copies.push(Unchanged {
                    new_start: new_cursor,
                    old_start: old_cursor,
                    len: Some(start - old_cursor),
                });
                new_cursor += start - old_cursor;
            }
            new_cursor += u64::from(shift.new_len);
            old_cursor = u64::from(u32::from(shift.original.end()));
        }
        copies.push(Unchanged {
            new_start: new_cursor,
            old_start: old_cursor,
            len: None,
        });
        copies
    }
}

#[derive(Clone, Copy, Debug)]
struct Unchanged {
    new_start: u64,
    old_start: u64,
    /// `None` runs to the end of the text.
    len: Option<u64>,
}

impl Unchanged {
    fn new_end(&self) -> u64 {
        self.len.map_or(u64::MAX, |len| self.new_start + len)
    }

    fn old_end(&self) -> u64 {
        self.len.map_or(u64::MAX, |len| self.old_start + len)
    }
}
