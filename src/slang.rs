//! Maps slang surface spelling onto the canonical spelling the lexer understands.
//!
//! This is plain text substitution on whole words. String literals and comments
//! are copied through untouched, so `"bet"` stays a string.

const TABLE: &[(&str, &str)] = &[
    ("bet", "let"),
    ("based", "const"),
    ("bruh", "fn"),
    ("sus", "if"),
    ("impostor", "else"),
    ("yall", "for"),
    ("nocap", "true"),
    ("cap", "false"),
    ("fake", "null"),
    ("fr", "=="),
    ("nah", "!="),
    ("btw", "&&"),
    ("carenot", "|"),
    ("rn", ";"),
    ("be", "="),
    ("waffle", "print"),
];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn lookup(word: &str) -> Option<&'static str> {
    TABLE
        .iter()
        .find(|(slang, _)| *slang == word)
        .map(|(_, canonical)| *canonical)
}

/// Rewrites every slang word in `source` to its canonical spelling.
pub fn canonicalize(source: &str) -> String {
    let mut output = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                output.push(c);
                // Copy the literal verbatim, honouring escapes
                while let Some(c) = chars.next() {
                    output.push(c);
                    match c {
                        '\\' => output.extend(chars.next()),
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                output.push(c);
                for c in chars.by_ref() {
                    output.push(c);
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                output.push(c);
                output.extend(chars.next());
                let mut previous = '\0';
                for c in chars.by_ref() {
                    output.push(c);
                    if previous == '*' && c == '/' {
                        break;
                    }
                    previous = c;
                }
            }
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !is_word_char(next) {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                output.push_str(lookup(&word).unwrap_or(&word));
            }
            c => output.push(c),
        }
    }

    output
}
