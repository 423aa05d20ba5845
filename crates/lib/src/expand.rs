//! Shell-style variable expansion.
//!
//! Used to render command strings against a build's composed environment at
//! plan time. Supports `$name`, `${name}`, `${name:-default}` (default when
//! unset or empty) and `${name-default}` (default when unset). A reference
//! the lookup cannot satisfy passes through literally so the shell can still
//! resolve it at execution time.

/// Expand all variable references in `input` through `lookup`.
pub fn expand<F>(input: &str, lookup: F) -> String
where
  F: Fn(&str) -> Option<String>,
{
  let mut out = String::with_capacity(input.len());
  let mut chars = input.char_indices().peekable();

  while let Some((_, ch)) = chars.next() {
    if ch != '$' {
      out.push(ch);
      continue;
    }

    match chars.peek().copied() {
      Some((_, '{')) => {
        chars.next();

        let mut content = String::new();
        let mut found_close = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            found_close = true;
            break;
          }
          content.push(c);
        }

        if !found_close {
          // Unterminated reference, keep the raw text.
          out.push_str("${");
          out.push_str(&content);
          continue;
        }

        out.push_str(&expand_braced(&content, &lookup));
      }
      Some((_, c)) if is_name_char(c) => {
        let mut name = String::new();
        while let Some(&(_, c)) = chars.peek() {
          if is_name_char(c) {
            name.push(c);
            chars.next();
          } else {
            break;
          }
        }

        match lookup(&name) {
          Some(value) => out.push_str(&value),
          None => {
            out.push('$');
            out.push_str(&name);
          }
        }
      }
      _ => out.push('$'),
    }
  }

  out
}

fn is_name_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_'
}

/// Expand the content of a `${...}` reference.
fn expand_braced<F>(content: &str, lookup: &F) -> String
where
  F: Fn(&str) -> Option<String>,
{
  if let Some((name, default)) = content.split_once(":-") {
    return match lookup(name) {
      Some(value) if !value.is_empty() => value,
      _ => default.to_string(),
    };
  }

  if let Some((name, default)) = content.split_once('-') {
    // Only treat as a default form when the left side is a plain name.
    if !name.is_empty() && name.chars().all(is_name_char) {
      return match lookup(name) {
        Some(value) => value,
        None => default.to_string(),
      };
    }
  }

  match lookup(content) {
    Some(value) => value,
    None => format!("${{{}}}", content),
  }
}
