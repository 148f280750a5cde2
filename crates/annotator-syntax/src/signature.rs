/// A method signature as the analyzer serializes it: `name(T1,T2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    /// Normalized simple parameter type names (see [`normalize_type_name`]).
    pub params: Vec<String>,
}

impl MethodSignature {
    /// Returns `None` when `raw` has no parameter list.
    pub fn parse(raw: &str) -> Option<Self> {
        let open = raw.find('(')?;
        let close = raw.rfind(')')?;
        if close < open {
            return None;
        }
        let name = raw[..open].trim().to_string();
        let inner = &raw[open + 1..close];
        let params = split_top_level(inner)
            .into_iter()
            .map(normalize_type_name)
            .filter(|ty| !ty.is_empty())
            .collect();
        Some(Self { name, params })
    }

    pub fn matches(&self, name: &str, param_types: &[String]) -> bool {
        self.name == name
            && self.params.len() == param_types.len()
            && self
                .params
                .iter()
                .zip(param_types)
                .all(|(expected, actual)| *expected == normalize_type_name(actual))
    }
}

/// Splits on commas that are not nested inside `<...>`.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Reduces a written or serialized type to a comparable form: generic
/// arguments, package and outer-class qualifiers are dropped and varargs
/// become arrays. `java.util.Map<K,V>[]` -> `Map[]`.
pub fn normalize_type_name(raw: &str) -> String {
    let mut erased = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for ch in raw.chars() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 && !ch.is_whitespace() => erased.push(ch),
            _ => {}
        }
    }

    let erased = erased.replace("...", "[]");
    let (ty, dims) = erased.split_at(erased.find('[').unwrap_or(erased.len()));
    let simple = ty.rsplit(['.', '$']).next().unwrap_or(ty);
    format!("{simple}{dims}")
}
