use thiserror::Error;

pub const ROLLS_PER_SECTION: usize = 23;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RosterError {
    #[error("class code {0:?} is too short")]
    TooShort(String),
    #[error("class code {0:?} does not start with a grade")]
    MissingGrade(String),
    #[error("unknown section letter {letter:?} in class {code:?}")]
    UnknownSection { code: String, letter: char },
    #[error("class code {0:?} has no division")]
    MissingDivision(String),
}

/// Roll numbers for a class code `<grade><section><division>`, e.g. `9ea`.
///
/// Sections `e` to `h` each own a block of 23 roll numbers, so rolls stay
/// unique across the sections of a grade.
pub fn roster_for_class(code: &str) -> Result<Vec<String>, RosterError> {
    if code.chars().count() < 3 {
        return Err(RosterError::TooShort(code.to_string()));
    }

    let digits = code.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return Err(RosterError::MissingGrade(code.to_string()));
    }
    let (grade, rest) = code.split_at(digits);

    let mut rest = rest.chars();
    let letter = rest
        .next()
        .ok_or_else(|| RosterError::MissingDivision(code.to_string()))?
        .to_ascii_lowercase();
    let offset = section_offset(letter).ok_or_else(|| RosterError::UnknownSection {
        code: code.to_string(),
        letter,
    })?;
    let division = rest.as_str();
    if division.is_empty() {
        return Err(RosterError::MissingDivision(code.to_string()));
    }

    Ok((1..=ROLLS_PER_SECTION)
        .map(|i| format!("{grade}1{division}{:02}", offset + i))
        .collect())
}

fn section_offset(letter: char) -> Option<usize> {
    match letter {
        'e' => Some(0),
        'f' => Some(ROLLS_PER_SECTION),
        'g' => Some(2 * ROLLS_PER_SECTION),
        'h' => Some(3 * ROLLS_PER_SECTION),
        _ => None,
    }
}
