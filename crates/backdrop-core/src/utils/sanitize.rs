//! 文件名净化工具

/// Make an uploaded file name safe to use as a single vault path component.
pub fn sanitize_filename_component(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return "wallpaper".to_string();
    }

    let mut out = String::with_capacity(trimmed.len().min(180));
    for c in trimmed.chars() {
        let forbidden = matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            || c.is_control();
        out.push(if forbidden { '_' } else { c });
        if out.len() >= 180 {
            break;
        }
    }

    let out = out.trim_matches([' ', '.']).to_string();
    if out.is_empty() {
        "wallpaper".to_string()
    } else {
        out
    }
}

/// Lower-cased extension of a file name, without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Insert `suffix` before the extension (`a.png` -> `a_quality.png`).
pub fn with_name_suffix(name: &str, suffix: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}{}", &name[..dot], suffix, &name[dot..]),
        _ => format!("{name}{suffix}"),
    }
}
