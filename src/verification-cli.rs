//! A simple CLI tool for verifying the integrity hashes of an election's votes.
//! This uses the internal server verification implementation, and is by definition
//! compatible with the output of our API endpoints.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use ballotbox_backend::engine::IntegrityKey;
use ballotbox_backend::model::api::{audit::VoteRecord, id::ApiId};

const PROGRAM_NAME: &str = "verify-votes";

const ABOUT_TEXT: &str = "Verify the integrity hashes of an election's votes.

EXIT CODES:
     0: Verification succeeded.
   255: Ran successfully, but verification failed.
 Other: Error.";

const LEDGER_PATH: &str = "LEDGER_PATH";

const LEDGER_PATH_HELP: &str = "The path to a JSON dump of an election's votes,\n\
as returned by `GET /admin/elections/<election_id>/votes`";

const SECRET: &str = "secret";

const SECRET_ENV: &str = "ROCKET_INTEGRITY_SECRET";

const SECRET_HELP: &str = "The integrity secret the server was configured with.\n\
Defaults to the value of `ROCKET_INTEGRITY_SECRET`";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(LEDGER_PATH)
                .help(LEDGER_PATH_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(SECRET)
                .long(SECRET)
                .short('s')
                .help(SECRET_HELP)
                .action(ArgAction::Set),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// No integrity secret was given.
    MissingSecret,
    /// Verification failed due to the contained reason.
    Verification(VerificationError),
}

/// Why a ledger failed verification.
#[derive(Debug, Eq, PartialEq)]
enum VerificationError {
    /// These votes do not match their stored hash.
    Tampered { vote_ids: Vec<ApiId> },
    /// A member has more than one vote for the same office.
    DuplicateVote { office_id: ApiId, member_id: ApiId },
}

/// Per-office totals of a verified ledger.
#[derive(Debug, Eq, PartialEq)]
struct OfficeSummary {
    pub office_id: ApiId,
    pub votes: u64,
    pub invalidated: u64,
}

impl Display for OfficeSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Office {}: {} vote{} ({} invalidated)",
            self.office_id,
            self.votes,
            if self.votes != 1 { "s" } else { "" },
            self.invalidated,
        )
    }
}

/// Check a ledger against the integrity key.
fn verify_records(
    records: &[VoteRecord],
    key: &IntegrityKey,
) -> Result<Vec<OfficeSummary>, VerificationError> {
    let vote_ids = records
        .iter()
        .filter(|record| !key.verify(&record.to_vote()))
        .map(|record| record.vote_id)
        .collect::<Vec<_>>();
    if !vote_ids.is_empty() {
        return Err(VerificationError::Tampered { vote_ids });
    }

    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert((record.office_id, record.member_id)) {
            return Err(VerificationError::DuplicateVote {
                office_id: record.office_id,
                member_id: record.member_id,
            });
        }
    }

    let mut summaries = BTreeMap::new();
    for record in records {
        let summary = summaries
            .entry(record.office_id)
            .or_insert_with(|| OfficeSummary {
                office_id: record.office_id,
                votes: 0,
                invalidated: 0,
            });
        summary.votes += 1;
        if record.invalidated {
            summary.invalidated += 1;
        }
    }
    Ok(summaries.into_values().collect())
}

/// Run verification.
fn verify(path: &str, secret: &str) -> Result<Vec<OfficeSummary>, Error> {
    // Load the file.
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let records: Vec<VoteRecord> =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    verify_records(&records, &IntegrityKey::new(secret)).map_err(Error::Verification)
}

/// Run verification, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(LEDGER_PATH).unwrap(); // Required argument is guaranteed to be present.
    let secret = args
        .get_one::<String>(SECRET)
        .cloned()
        .or_else(|| std::env::var(SECRET_ENV).ok());
    let result = match secret {
        Some(secret) if !secret.is_empty() => verify(path, &secret),
        _ => Err(Error::MissingSecret),
    };
    match result {
        Ok(summaries) => {
            println!("Verification succeeded.");
            for summary in summaries {
                println!("{summary}");
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {msg}");
            1
        }
        Err(Error::MissingSecret) => {
            println!("No integrity secret given; pass --{SECRET} or set {SECRET_ENV}.");
            1
        }
        Err(Error::Verification(err)) => {
            let msg = match err {
                VerificationError::Tampered { vote_ids } => format!(
                    "{} vote{} failed the integrity check: {}",
                    vote_ids.len(),
                    if vote_ids.len() != 1 { "s" } else { "" },
                    vote_ids
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                VerificationError::DuplicateVote {
                    office_id,
                    member_id,
                } => format!("Member {member_id} has more than one vote for office {office_id}."),
            };
            println!("Verification failed: {msg}");
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ballotbox_backend::engine::record::VoteBuilder;
    use ballotbox_backend::model::{
        common::outcome::VoteOutcome, db::vote::OriginMetadata, mongodb::Id,
    };
    use chrono::Utc;
    use rand::{distributions::Alphanumeric, Rng};

    use super::*;

    const TEST_SECRET: &str = "verification-test-secret";

    /// Two members voting on two offices, plus an invalidated vote.
    fn ledger() -> Vec<VoteRecord> {
        let key = IntegrityKey::new(TEST_SECRET);
        let election = Id::new();
        let offices = [Id::new(), Id::new()];
        let mut records = Vec::new();
        for (i, member) in [Id::new(), Id::new()].into_iter().enumerate() {
            let builder =
                VoteBuilder::new(&key, election, member, Utc::now(), OriginMetadata::default());
            records.push(VoteRecord::new(
                &builder.build(
                    offices[0],
                    VoteOutcome::Candidate {
                        candidacy_id: Id::new(),
                    },
                ),
                i == 1,
            ));
            records.push(VoteRecord::new(&builder.build(offices[1], VoteOutcome::Blank), false));
        }
        records
    }

    /// Write a ledger to a fresh file in the temp directory.
    fn write_ledger(records: &[VoteRecord]) -> PathBuf {
        let name: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let path = std::env::temp_dir().join(format!("ledger-{name}.json"));
        std::fs::write(&path, serde_json::to_string(records).unwrap()).unwrap();
        path
    }

    #[test]
    fn verification() {
        // This test actually enters backend code, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(["ballotbox_backend"], None, None);

        let records = ledger();
        let path = write_ledger(&records);
        let summaries = verify(path.to_str().unwrap(), TEST_SECRET).unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.votes == 2));
        assert_eq!(summaries.iter().map(|s| s.invalidated).sum::<u64>(), 1);

        // The wrong secret fails every vote.
        let result = verify(path.to_str().unwrap(), "another-secret");
        assert!(matches!(
            result,
            Err(Error::Verification(VerificationError::Tampered { ref vote_ids })) if vote_ids.len() == 4
        ));
    }

    #[test]
    fn tampered_outcome_detected() {
        let mut records = ledger();
        records[1].outcome = VoteOutcome::Null;
        let tampered = records[1].vote_id;
        assert_eq!(
            verify_records(&records, &IntegrityKey::new(TEST_SECRET)),
            Err(VerificationError::Tampered {
                vote_ids: vec![tampered]
            })
        );
    }

    #[test]
    fn duplicate_vote_detected() {
        let mut records = ledger();
        let mut copy = records[0].clone();
        copy.vote_id = Id::new().into();
        let (office_id, member_id) = (copy.office_id, copy.member_id);
        records.push(copy);
        // The hash does not cover the vote ID, so the copy still verifies.
        assert_eq!(
            verify_records(&records, &IntegrityKey::new(TEST_SECRET)),
            Err(VerificationError::DuplicateVote {
                office_id,
                member_id
            })
        );
    }

    #[test]
    fn correct_cli_usage() {
        let good = write_ledger(&ledger());
        let good = good.to_str().unwrap();
        let mut tampered = ledger();
        tampered[0].cast_at = tampered[0].cast_at + chrono::Duration::milliseconds(1);
        let tampered = write_ledger(&tampered);
        let tampered = tampered.to_str().unwrap();

        let command_line = [PROGRAM_NAME, good, "--secret", TEST_SECRET];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, tampered, "-s", TEST_SECRET];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 255);

        let command_line = [PROGRAM_NAME, "not a real file", "-s", TEST_SECRET];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        let command_line = [PROGRAM_NAME, good, "--secret", ""];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No options at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
