//! Text encoding of [`Message`] values.
//!
//! A message is a run of `field:value` lines closed by a blank line. The
//! first field is always `operation`:
//!
//! ```text
//! operation:RoomInfoOk
//! name:R1
//! time:1700000000000
//! list:alice,bob
//!
//! ```
//!
//! The opcode decides the remaining fields. Lists use `,` between items;
//! the member lists of a `RoomListOk` use `;` between rooms, and an empty
//! member list is an empty run, so the room count is always recoverable.

use crate::{Message, MessageKind, MultiInfo, Opcode, ProtocolError};

const OPERATION_FIELD: &str = "operation";
const NAME_FIELD: &str = "name";
const TIME_FIELD: &str = "time";
const LIST_FIELD: &str = "list";
const TEXT_FIELD: &str = "text";
const MULTI_NAME_FIELD: &str = "multiName";
const MULTI_TIME_FIELD: &str = "multiTime";
const MULTI_LIST_FIELD: &str = "multiList";

const DELIMITER: char = ':';
const END_LINE: char = '\n';
const LIST_SEPARATOR: char = ',';
const GROUP_SEPARATOR: char = ';';

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a message as field:value text.
///
/// # Errors
/// Returns [`ProtocolError::InvalidMessage`] if the opcode does not belong
/// to the message's kind, a value contains a line break, or a list item is
/// empty or contains a separator.
pub fn encode(msg: &Message) -> Result<String, ProtocolError> {
    let opcode = msg.opcode();
    if opcode.kind() != msg.kind() {
        return Err(ProtocolError::InvalidMessage(format!(
            "{opcode} is a {:?} operation, not {:?}",
            opcode.kind(),
            msg.kind()
        )));
    }

    let mut out = String::new();
    push_field(&mut out, OPERATION_FIELD, opcode.name())?;

    match msg {
        Message::Control { .. } => {}
        Message::Room { name, .. } => {
            push_field(&mut out, NAME_FIELD, name)?;
        }
        Message::Info {
            name,
            time,
            members,
            ..
        } => {
            push_field(&mut out, NAME_FIELD, name)?;
            push_field(&mut out, TIME_FIELD, &time.to_string())?;
            push_field(&mut out, LIST_FIELD, &join_list(members)?)?;
        }
        Message::MultiInfo { rooms, .. } => {
            let times: Vec<String> =
                rooms.times().iter().map(u64::to_string).collect();
            let groups = rooms
                .lists()
                .iter()
                .map(|members| join_list(members))
                .collect::<Result<Vec<_>, _>>()?;

            push_field(&mut out, MULTI_NAME_FIELD, &join_list(rooms.names())?)?;
            push_field(&mut out, MULTI_TIME_FIELD, &join_list(&times)?)?;
            push_field(
                &mut out,
                MULTI_LIST_FIELD,
                &groups.join(&GROUP_SEPARATOR.to_string()),
            )?;
        }
        Message::User { name, text, .. } => {
            push_field(&mut out, NAME_FIELD, name)?;
            push_field(&mut out, TEXT_FIELD, text)?;
        }
    }

    out.push(END_LINE);
    Ok(out)
}

fn push_field(
    out: &mut String,
    field: &str,
    value: &str,
) -> Result<(), ProtocolError> {
    if value.contains(['\n', '\r']) {
        return Err(ProtocolError::InvalidMessage(format!(
            "value of `{field}` contains a line break"
        )));
    }
    out.push_str(field);
    out.push(DELIMITER);
    out.push_str(value);
    out.push(END_LINE);
    Ok(())
}

fn join_list(items: &[String]) -> Result<String, ProtocolError> {
    if let Some(bad) = items
        .iter()
        .find(|item| item.is_empty() || item.contains([LIST_SEPARATOR, GROUP_SEPARATOR]))
    {
        return Err(ProtocolError::InvalidMessage(format!(
            "list item {bad:?} is empty or contains a separator"
        )));
    }
    Ok(items.join(&LIST_SEPARATOR.to_string()))
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes field:value text into a message.
///
/// # Errors
/// - [`ProtocolError::UnknownOperation`] if the operation name is not in
///   the opcode table.
/// - [`ProtocolError::MalformedMessage`] for anything structurally wrong:
///   a missing terminator, a missing or misnamed field, a non-numeric
///   time, mismatched list lengths, or extra fields.
pub fn decode(text: &str) -> Result<Message, ProtocolError> {
    let mut fields = Fields::parse(text)?;

    let operation = fields.expect(OPERATION_FIELD)?;
    let opcode = Opcode::from_name(operation)
        .ok_or_else(|| ProtocolError::UnknownOperation(operation.to_string()))?;

    let msg = match opcode.kind() {
        MessageKind::Control => Message::Control { opcode },
        MessageKind::Room => Message::Room {
            opcode,
            name: fields.expect(NAME_FIELD)?.to_string(),
        },
        MessageKind::Info => {
            let name = fields.expect(NAME_FIELD)?.to_string();
            let time = parse_time(fields.expect(TIME_FIELD)?)?;
            let members = split_list(fields.expect(LIST_FIELD)?)?;
            Message::Info {
                opcode,
                name,
                time,
                members,
            }
        }
        MessageKind::MultiInfo => Message::MultiInfo {
            opcode,
            rooms: decode_multi_info(&mut fields)?,
        },
        MessageKind::User => Message::User {
            opcode,
            name: fields.expect(NAME_FIELD)?.to_string(),
            text: fields.expect(TEXT_FIELD)?.to_string(),
        },
    };

    fields.finish()?;
    Ok(msg)
}

fn decode_multi_info(
    fields: &mut Fields<'_>,
) -> Result<MultiInfo, ProtocolError> {
    let names = split_list(fields.expect(MULTI_NAME_FIELD)?)?;
    let times = split_list(fields.expect(MULTI_TIME_FIELD)?)?
        .iter()
        .map(|t| parse_time(t))
        .collect::<Result<Vec<_>, _>>()?;
    let raw_lists = fields.expect(MULTI_LIST_FIELD)?;

    // With no rooms there is no group at all, not one empty group.
    let lists = if names.is_empty() && raw_lists.is_empty() {
        Vec::new()
    } else {
        raw_lists
            .split(GROUP_SEPARATOR)
            .map(split_list)
            .collect::<Result<Vec<_>, _>>()?
    };

    MultiInfo::new(names, times, lists)
        .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

fn parse_time(value: &str) -> Result<u64, ProtocolError> {
    value.parse().map_err(|_| {
        ProtocolError::MalformedMessage(format!("time {value:?} is not a number"))
    })
}

fn split_list(value: &str) -> Result<Vec<String>, ProtocolError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(LIST_SEPARATOR)
        .map(|item| {
            if item.is_empty() {
                Err(ProtocolError::MalformedMessage(format!(
                    "empty item in list {value:?}"
                )))
            } else {
                Ok(item.to_string())
            }
        })
        .collect()
}

/// The `field:value` lines of one message, consumed in order.
struct Fields<'a> {
    lines: std::vec::IntoIter<(&'a str, &'a str)>,
}

impl<'a> Fields<'a> {
    fn parse(text: &'a str) -> Result<Self, ProtocolError> {
        let mut lines = text.split_inclusive(END_LINE);
        let mut pairs = Vec::new();

        loop {
            let line = lines
                .next()
                .and_then(|raw| raw.strip_suffix(END_LINE))
                .ok_or_else(|| {
                    ProtocolError::MalformedMessage(
                        "missing blank-line terminator".into(),
                    )
                })?;
            if line.is_empty() {
                break;
            }
            let (field, value) = line.split_once(DELIMITER).ok_or_else(|| {
                ProtocolError::MalformedMessage(format!(
                    "line {line:?} has no `{DELIMITER}`"
                ))
            })?;
            pairs.push((field, value));
        }

        if lines.next().is_some() {
            return Err(ProtocolError::MalformedMessage(
                "data after the blank-line terminator".into(),
            ));
        }

        Ok(Self {
            lines: pairs.into_iter(),
        })
    }

    /// Takes the next field, which must be named `name`.
    fn expect(&mut self, name: &str) -> Result<&'a str, ProtocolError> {
        match self.lines.next() {
            Some((field, value)) if field.eq_ignore_ascii_case(name) => {
                Ok(value)
            }
            Some((field, _)) => Err(ProtocolError::MalformedMessage(format!(
                "expected field `{name}`, found `{field}`"
            ))),
            None => Err(ProtocolError::MalformedMessage(format!(
                "missing field `{name}`"
            ))),
        }
    }

    fn finish(mut self) -> Result<(), ProtocolError> {
        match self.lines.next() {
            None => Ok(()),
            Some((field, _)) => Err(ProtocolError::MalformedMessage(format!(
                "unexpected field `{field}`"
            ))),
        }
    }
}
