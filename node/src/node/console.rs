//! Line based interface of `chainsync run-node`.
//!
//! ```text
//! tx <sender> <recipient> <amount>
//! mine
//! chain
//! status
//! quit
//! ```
use std::str::FromStr;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::chain::Transaction;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Unknown command '{0}', expected one of: tx, mine, chain, status, quit")]
    UnknownCommand(String),
    #[error("Usage: tx <sender> <recipient> <amount>")]
    TransactionUsage,
    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    AddTransaction(Transaction),
    Mine,
    Chain,
    Status,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        match command {
            "tx" => {
                let (Some(sender), Some(recipient), Some(amount), None) =
                    (words.next(), words.next(), words.next(), words.next())
                else {
                    return Err(ConsoleError::TransactionUsage);
                };
                let amount = amount
                    .parse()
                    .map_err(|_| ConsoleError::InvalidAmount(amount.to_string()))?;
                Ok(ConsoleCommand::AddTransaction(Transaction::new(
                    sender, recipient, amount,
                )))
            }
            "mine" => Ok(ConsoleCommand::Mine),
            "chain" => Ok(ConsoleCommand::Chain),
            "status" => Ok(ConsoleCommand::Status),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(ConsoleError::UnknownCommand(other.to_string())),
        }
    }
}

pub struct Console<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    pub fn new(input: R) -> Self {
        Console {
            lines: input.lines(),
        }
    }

    /// Next command, skipping blank lines. `None` once the input is closed.
    pub async fn next_command(&mut self) -> Option<Result<ConsoleCommand, ConsoleError>> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(line.parse()),
                Ok(None) => return None,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_parse_transaction() {
        assert_eq!(
            "tx alice bob 42".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::AddTransaction(Transaction::new("alice", "bob", 42))
        );
    }

    #[test]
    fn test_parse_invalid_transaction() {
        assert_matches!(
            "tx alice bob".parse::<ConsoleCommand>(),
            Err(ConsoleError::TransactionUsage)
        );
        assert_matches!(
            "tx alice bob 1 2".parse::<ConsoleCommand>(),
            Err(ConsoleError::TransactionUsage)
        );
        assert_matches!(
            "tx alice bob many".parse::<ConsoleCommand>(),
            Err(ConsoleError::InvalidAmount(amount)) if amount == "many"
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_matches!(
            "steal everything".parse::<ConsoleCommand>(),
            Err(ConsoleError::UnknownCommand(cmd)) if cmd == "steal"
        );
    }

    #[tokio::test]
    async fn test_reads_commands_until_input_ends() {
        let input: &[u8] = b"mine\n\n  chain \nstatus\nquit\n";
        let mut console = Console::new(input);

        assert_matches!(console.next_command().await, Some(Ok(ConsoleCommand::Mine)));
        assert_matches!(console.next_command().await, Some(Ok(ConsoleCommand::Chain)));
        assert_matches!(console.next_command().await, Some(Ok(ConsoleCommand::Status)));
        assert_matches!(console.next_command().await, Some(Ok(ConsoleCommand::Quit)));
        assert_matches!(console.next_command().await, None);
    }
}
