//! Command Execution
//!
//! This module turns parsed commands into cache mutations and wire
//! responses. It is the glue between the protocol layer and the cache
//! engine, and it owns the one rule the response path must never break:
//! a command that carried `noreply` produces no output at all, whatever
//! its outcome.

use crate::protocol::{Command, Parsed, Response, StoreCommand, Value};
use crate::storage::{CacheEngine, Entry, MutationOutcome};
use std::sync::Arc;
use tracing::debug;

/// Maps a mutation outcome to the reply to write, if any.
///
/// This is the entire response-encoding step for mutations: four outcomes,
/// four lines. Under `noreply` the client has declared it will not read a
/// response, so correctness is defined purely by the store's state and the
/// reply is dropped.
pub fn mutation_reply(outcome: MutationOutcome, noreply: bool) -> Option<Response> {
    if noreply {
        return None;
    }
    Some(match outcome {
        MutationOutcome::Stored => Response::Stored,
        MutationOutcome::NotStored => Response::NotStored,
        MutationOutcome::Deleted => Response::Deleted,
        MutationOutcome::NotFound => Response::NotFound,
    })
}

/// Executes commands against a shared [`CacheEngine`].
#[derive(Debug, Clone)]
pub struct CommandHandler {
    cache: Arc<CacheEngine>,
}

impl CommandHandler {
    /// Creates a new command handler over the given cache engine.
    pub fn new(cache: Arc<CacheEngine>) -> Self {
        Self { cache }
    }

    /// Executes one parsed unit and returns the response to write.
    ///
    /// `None` means the connection writes nothing: either the client asked
    /// for `noreply`, or the unit was `quit` (which the connection loop
    /// intercepts before calling this).
    pub fn execute(&self, parsed: Parsed) -> Option<Response> {
        match parsed {
            Parsed::Command(command) => self.dispatch(command),
            Parsed::Malformed { reason, noreply } => {
                debug!(reason = %reason, noreply = noreply, "Rejected command line");
                if noreply {
                    None
                } else {
                    Some(Response::Error)
                }
            }
        }
    }

    fn dispatch(&self, command: Command) -> Option<Response> {
        match command {
            Command::Set(store) => {
                let StoreCommand {
                    key,
                    flags,
                    exptime,
                    data,
                    noreply,
                } = store;
                let outcome = self.cache.set(key, Entry::new(data, flags, exptime));
                mutation_reply(outcome, noreply)
            }
            Command::Add(store) => {
                let StoreCommand {
                    key,
                    flags,
                    exptime,
                    data,
                    noreply,
                } = store;
                let outcome = self.cache.add(key, Entry::new(data, flags, exptime));
                mutation_reply(outcome, noreply)
            }
            Command::Delete { key, noreply } => mutation_reply(self.cache.delete(&key), noreply),
            Command::Get { keys } => {
                let values = keys
                    .into_iter()
                    .filter_map(|key| {
                        self.cache.get(&key).map(|entry| Value {
                            key,
                            flags: entry.flags,
                            data: entry.data,
                        })
                    })
                    .collect();
                Some(Response::Values(values))
            }
            Command::Version => Some(Response::Version(crate::VERSION.to_string())),
            // The connection loop closes on quit without executing it.
            Command::Quit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RejectReason;
    use bytes::Bytes;

    fn create_handler() -> CommandHandler {
        CommandHandler::new(Arc::new(CacheEngine::new()))
    }

    fn store(key: &str, data: &str, noreply: bool) -> StoreCommand {
        StoreCommand {
            key: Bytes::from(key.to_string()),
            flags: 0,
            exptime: 0,
            data: Bytes::from(data.to_string()),
            noreply,
        }
    }

    #[test]
    fn test_set_reports_stored() {
        let handler = create_handler();

        let response = handler.execute(Parsed::Command(Command::Set(store("k", "v", false))));
        assert_eq!(response, Some(Response::Stored));
    }

    #[test]
    fn test_add_twice_reports_not_stored() {
        let handler = create_handler();

        let first = handler.execute(Parsed::Command(Command::Add(store("k", "v", false))));
        let second = handler.execute(Parsed::Command(Command::Add(store("k", "v2", false))));
        assert_eq!(first, Some(Response::Stored));
        assert_eq!(second, Some(Response::NotStored));
    }

    #[test]
    fn test_delete_absent_reports_not_found() {
        let handler = create_handler();

        let response = handler.execute(Parsed::Command(Command::Delete {
            key: Bytes::from("ghost"),
            noreply: false,
        }));
        assert_eq!(response, Some(Response::NotFound));
    }

    #[test]
    fn test_noreply_suppresses_every_outcome() {
        let handler = create_handler();

        // Stored
        assert_eq!(
            handler.execute(Parsed::Command(Command::Set(store("k", "v", true)))),
            None
        );
        // NotStored
        assert_eq!(
            handler.execute(Parsed::Command(Command::Add(store("k", "v2", true)))),
            None
        );
        // NotFound
        assert_eq!(
            handler.execute(Parsed::Command(Command::Delete {
                key: Bytes::from("ghost"),
                noreply: true,
            })),
            None
        );
        // The set above still landed.
        assert_eq!(
            handler.execute(Parsed::Command(Command::Delete {
                key: Bytes::from("k"),
                noreply: false,
            })),
            Some(Response::Deleted)
        );
    }

    #[test]
    fn test_malformed_reports_error() {
        let handler = create_handler();

        let response = handler.execute(Parsed::Malformed {
            reason: RejectReason::UnknownCommand,
            noreply: false,
        });
        assert_eq!(response, Some(Response::Error));
    }

    #[test]
    fn test_malformed_with_noreply_is_silent() {
        let handler = create_handler();

        let response = handler.execute(Parsed::Malformed {
            reason: RejectReason::BadInteger,
            noreply: true,
        });
        assert_eq!(response, None);
    }

    #[test]
    fn test_get_returns_present_keys_only() {
        let handler = create_handler();

        handler.execute(Parsed::Command(Command::Set(store("a", "1", false))));
        handler.execute(Parsed::Command(Command::Set(store("b", "2", false))));

        let response = handler.execute(Parsed::Command(Command::Get {
            keys: vec![Bytes::from("a"), Bytes::from("missing"), Bytes::from("b")],
        }));

        match response {
            Some(Response::Values(values)) => {
                assert_eq!(values.len(), 2);
                assert_eq!(values[0].key, Bytes::from("a"));
                assert_eq!(values[1].key, Bytes::from("b"));
            }
            other => panic!("expected values, got {:?}", other),
        }
    }

    #[test]
    fn test_version() {
        let handler = create_handler();

        let response = handler.execute(Parsed::Command(Command::Version));
        assert_eq!(
            response,
            Some(Response::Version(crate::VERSION.to_string()))
        );
    }

    #[test]
    fn test_mutation_reply_table() {
        assert_eq!(
            mutation_reply(MutationOutcome::Stored, false),
            Some(Response::Stored)
        );
        assert_eq!(
            mutation_reply(MutationOutcome::NotStored, false),
            Some(Response::NotStored)
        );
        assert_eq!(
            mutation_reply(MutationOutcome::Deleted, false),
            Some(Response::Deleted)
        );
        assert_eq!(
            mutation_reply(MutationOutcome::NotFound, false),
            Some(Response::NotFound)
        );
        for outcome in [
            MutationOutcome::Stored,
            MutationOutcome::NotStored,
            MutationOutcome::Deleted,
            MutationOutcome::NotFound,
        ] {
            assert_eq!(mutation_reply(outcome, true), None);
        }
    }
}
