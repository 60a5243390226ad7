//! Navigable HL7v2 message tree and the pipe-delimited parser producing it.
//!
//! Positions follow HL7 numbering: fields and components are 1-based. For
//! `MSH`, field 1 is the field separator and field 2 the encoding characters.

use intake_core::{ProcessingError, ProcessingResult};

/// Turns raw encoded text into a [`Message`].
pub trait MessageParser {
    fn parse(&self, raw: &str) -> ProcessingResult<Message>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separators {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub segments: Vec<Segment>,
    pub separators: Separators,
}

impl Message {
    /// First segment named `name`.
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.name == name)
    }

    pub fn segment_mut(&mut self, name: &str) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|segment| segment.name == name)
    }

    /// Declared structure from MSH-9, e.g. `ORU_R01`.
    ///
    /// Uses the message structure component when present, otherwise joins
    /// the message code and trigger event.
    pub fn message_type(&self) -> Option<String> {
        let msh9 = self.segment("MSH")?.field(9)?;
        if let Some(structure) = msh9.component(3).filter(|s| !s.is_empty()) {
            return Some(structure.to_string());
        }
        let code = msh9.component(1).filter(|s| !s.is_empty())?;
        match msh9.component(2).filter(|s| !s.is_empty()) {
            Some(trigger) => Some(format!("{code}_{trigger}")),
            None => Some(code.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    fields: Vec<Field>,
}

impl Segment {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Field at 1-based `position`, if the segment is long enough.
    pub fn field(&self, position: usize) -> Option<&Field> {
        position.checked_sub(1).and_then(|i| self.fields.get(i))
    }

    /// First component of the first repetition of a field; empty when absent.
    pub fn value(&self, position: usize) -> &str {
        self.field(position).map(Field::value).unwrap_or("")
    }

    /// Component of the first repetition of a field, `None` when empty.
    pub fn component(&self, position: usize, component: usize) -> Option<&str> {
        self.field(position)?
            .component(component)
            .filter(|value| !value.is_empty())
    }

    /// Overwrite one component of the first repetition, growing the segment
    /// as needed.
    pub fn set_component(&mut self, position: usize, component: usize, value: &str) {
        let (Some(field_index), Some(component_index)) =
            (position.checked_sub(1), component.checked_sub(1))
        else {
            return;
        };
        if self.fields.len() <= field_index {
            self.fields.resize_with(field_index + 1, Field::default);
        }
        let field = &mut self.fields[field_index];
        if field.repetitions.is_empty() {
            field.repetitions.push(Vec::new());
        }
        let repetition = &mut field.repetitions[0];
        if repetition.len() <= component_index {
            repetition.resize_with(component_index + 1, || vec![String::new()]);
        }
        repetition[component_index] = vec![value.to_string()];
    }
}

/// One field: repetitions of components of subcomponents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    repetitions: Vec<Vec<Vec<String>>>,
}

impl Field {
    /// A field holding one unsplit value.
    pub fn verbatim(value: impl Into<String>) -> Self {
        Self {
            repetitions: vec![vec![vec![value.into()]]],
        }
    }

    pub fn value(&self) -> &str {
        self.component(1).unwrap_or("")
    }

    pub fn component(&self, component: usize) -> Option<&str> {
        self.repetitions().next()?.component(component)
    }

    pub fn repetitions(&self) -> impl Iterator<Item = Repetition<'_>> {
        self.repetitions.iter().map(|rep| Repetition(rep))
    }

    /// True when no repetition carries any text.
    pub fn is_empty(&self) -> bool {
        self.repetitions
            .iter()
            .flatten()
            .flatten()
            .all(|sub| sub.is_empty())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Repetition<'a>(&'a [Vec<String>]);

impl<'a> Repetition<'a> {
    /// First subcomponent of a 1-based component.
    pub fn component(&self, component: usize) -> Option<&'a str> {
        self.subcomponent(component, 1)
    }

    pub fn subcomponent(&self, component: usize, subcomponent: usize) -> Option<&'a str> {
        let comp = self.0.get(component.checked_sub(1)?)?;
        comp.get(subcomponent.checked_sub(1)?).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().flatten().all(|sub| sub.is_empty())
    }
}

/// Parser for the classic pipe-delimited encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hl7Parser;

impl MessageParser for Hl7Parser {
    fn parse(&self, raw: &str) -> ProcessingResult<Message> {
        let mut lines = raw
            .split(['\r', '\n'])
            .filter(|line| !line.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| malformed("message is empty"))?;
        if !header.starts_with("MSH") {
            return Err(malformed("message must start with an MSH segment"));
        }

        let separators = extract_separators(header)?;
        let mut segments = vec![parse_msh(header, &separators)];
        for line in lines {
            segments.push(parse_segment(line, &separators)?);
        }

        Ok(Message {
            segments,
            separators,
        })
    }
}

fn malformed(reason: impl Into<String>) -> ProcessingError {
    ProcessingError::MalformedMessage(reason.into())
}

fn extract_separators(header: &str) -> ProcessingResult<Separators> {
    let mut chars = header.chars().skip(3);
    let field = chars
        .next()
        .ok_or_else(|| malformed("MSH segment too short to extract separators"))?;
    let encoding: Vec<char> = chars.take_while(|c| *c != field).collect();
    if encoding.is_empty() {
        return Err(malformed("MSH-2 encoding characters are missing"));
    }

    let defaults = Separators::default();
    Ok(Separators {
        field,
        component: encoding[0],
        repetition: encoding.get(1).copied().unwrap_or(defaults.repetition),
        escape: encoding.get(2).copied().unwrap_or(defaults.escape),
        subcomponent: encoding.get(3).copied().unwrap_or(defaults.subcomponent),
    })
}

fn parse_msh(header: &str, separators: &Separators) -> Segment {
    // "MSH" + field separator, then MSH-2 up to the next separator.
    let rest: String = header.chars().skip(4).collect();
    let mut parts = rest.split(separators.field);
    let encoding = parts.next().unwrap_or_default();

    let mut fields = vec![
        Field::verbatim(separators.field.to_string()),
        Field::verbatim(encoding),
    ];
    fields.extend(parts.map(|part| parse_field(part, separators)));
    Segment::new("MSH", fields)
}

fn parse_segment(line: &str, separators: &Separators) -> ProcessingResult<Segment> {
    let mut parts = line.split(separators.field);
    let name = parts.next().unwrap_or_default();
    if name.len() != 3
        || !name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(malformed(format!("invalid segment name: {name}")));
    }

    let fields = parts.map(|part| parse_field(part, separators)).collect();
    Ok(Segment::new(name, fields))
}

fn parse_field(raw: &str, separators: &Separators) -> Field {
    let repetitions = raw
        .split(separators.repetition)
        .map(|rep| {
            rep.split(separators.component)
                .map(|comp| {
                    comp.split(separators.subcomponent)
                        .map(|sub| unescape(sub, separators))
                        .collect()
                })
                .collect()
        })
        .collect();
    Field { repetitions }
}

/// Resolve the delimiter escape sequences (`\F\`, `\S\`, `\T\`, `\R\`, `\E\`).
fn unescape(value: &str, separators: &Separators) -> String {
    let escape = separators.escape;
    if !value.contains(escape) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find(escape) {
        out.push_str(&rest[..start]);
        let after = &rest[start + escape.len_utf8()..];
        let Some(end) = after.find(escape) else {
            out.push_str(&rest[start..]);
            return out;
        };
        match &after[..end] {
            "F" => out.push(separators.field),
            "S" => out.push(separators.component),
            "T" => out.push(separators.subcomponent),
            "R" => out.push(separators.repetition),
            "E" => out.push(escape),
            other => {
                out.push(escape);
                out.push_str(other);
                out.push(escape);
            }
        }
        rest = &after[end + escape.len_utf8()..];
    }
    out.push_str(rest);
    out
}
