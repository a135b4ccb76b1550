//! Text format of tracker output.
//!
//! The exact line formats are a compatibility surface: tooling and tests compare tracker
//! output verbatim.
//!
//! | Event | Line |
//! |-------|------|
//! | registration | `*** Creating <type> <n>` |
//! | disposal | `*** Disposing <type> <n>` |
//! | disposal of an unknown object | `Disposing <type>: Error: Object was not registered` |
//! | duplicate registration | `Creating <type>: Error: Object was already registered` |
//! | dump header | `**** Undisposed Object Dump:` |
//! | dump entry | `\t<type>: <n1>,<n2>,...` |
//! | dump entry with trace | `\t<type>: <n>\n\tStack Trace:\n<trace>` |

use crate::tracker::LineSink;

/// First line of every dump.
pub const DUMP_HEADER: &str = "**** Undisposed Object Dump:";

pub(crate) fn creating(type_name: &str, number: u32) -> String {
    format!("*** Creating {type_name} {number}")
}

pub(crate) fn disposing(type_name: &str, number: u32) -> String {
    format!("*** Disposing {type_name} {number}")
}

pub(crate) fn not_registered(type_name: &str) -> String {
    format!("Disposing {type_name}: Error: Object was not registered")
}

pub(crate) fn already_registered(type_name: &str) -> String {
    format!("Creating {type_name}: Error: Object was already registered")
}

pub(crate) fn no_longer_alive(type_name: &str) -> String {
    format!("Creating {type_name}: Error: Object is no longer alive")
}

/// One outstanding object as seen by a dump.
pub(crate) struct DumpEntry<'a> {
    pub number: u32,
    pub trace: &'a str,
}

/// Writes a full dump of `outstanding` to `sink`.
///
/// In trace mode every instance gets its own entry followed by its creation trace; without
/// traces each type is one line listing all outstanding numbers.
pub(crate) fn write_dump<'a, I, E>(sink: &dyn LineSink, outstanding: I, with_trace: bool)
where
    I: IntoIterator<Item = (&'a str, E)>,
    E: IntoIterator<Item = DumpEntry<'a>>,
{
    sink.write_line(DUMP_HEADER);
    for (type_name, entries) in outstanding {
        if with_trace {
            for entry in entries {
                sink.write_line(&format!(
                    "\t{type_name}: {}\n\tStack Trace:\n{}",
                    entry.number, entry.trace
                ));
            }
        } else {
            let numbers: Vec<String> = entries
                .into_iter()
                .map(|entry| entry.number.to_string())
                .collect();
            sink.write_line(&format!("\t{type_name}: {}", numbers.join(",")));
        }
    }
}
