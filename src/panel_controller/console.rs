//! operator console: prompts, menu and status output

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::command::PanelCommand;
use super::panel_state::PanelSnapshot;
use crate::common::error::PanelError;
use crate::entity::bo::output_vector_bo::OutputVector;
use crate::entity::bo::target_bo::ConnectionTarget;

/// invalid answers accepted before a prompt gives up and returns to the menu
pub const MAX_PROMPT_ATTEMPTS: usize = 3;

pub struct Console<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Console { reader, writer }
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer
    }

    pub fn say(&mut self, text: &str) -> Result<(), PanelError> {
        writeln!(self.writer, "{}", text)
            .and_then(|_| self.writer.flush())
            .map_err(|e| PanelError::console_closed(format!("console write error: {}", e)))
    }

    /// print `question` and read one line, end of input closes the console
    pub async fn prompt(&mut self, question: &str) -> Result<String, PanelError> {
        write!(self.writer, "{} ", question)
            .and_then(|_| self.writer.flush())
            .map_err(|e| PanelError::console_closed(format!("console write error: {}", e)))?;

        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| PanelError::console_closed(format!("console read error: {}", e)))?;
        if read == 0 {
            return Err(PanelError::console_closed("operator input closed"));
        }
        Ok(line.trim().to_string())
    }

    /// ask until `parse` accepts the answer, at most `MAX_PROMPT_ATTEMPTS` times
    pub async fn prompt_valid<T, F>(&mut self, question: &str, parse: F) -> Result<T, PanelError>
    where
        F: Fn(&str) -> Result<T, PanelError>,
    {
        let mut attempt = 1;
        loop {
            let answer = self.prompt(question).await?;
            match parse(answer.as_str()) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= MAX_PROMPT_ATTEMPTS => return Err(e),
                Err(e) => {
                    self.say(format!("{}. Please try again.", e.msg).as_str())?;
                    attempt += 1;
                }
            }
        }
    }

    pub fn show_menu(&mut self) -> Result<(), PanelError> {
        self.say("\nAvailable commands:")?;
        for (i, command) in PanelCommand::ALL.iter().enumerate() {
            self.say(format!("{}. {}", i + 1, command.name()).as_str())?;
        }
        Ok(())
    }

    pub fn show_status(&mut self, title: &str, snapshot: &PanelSnapshot) -> Result<(), PanelError> {
        self.say(format!("\n{}:", title).as_str())?;
        self.say(format_status(snapshot).as_str())
    }

    /// settings only, for state that has no link behind it yet
    pub fn show_settings(&mut self, title: &str, target: &ConnectionTarget, outputs: &OutputVector) -> Result<(), PanelError> {
        self.say(format!("\n{}:", title).as_str())?;
        self.say(format_settings(target, outputs).as_str())
    }

    pub fn report(&mut self, operation: &str, err: &PanelError) -> Result<(), PanelError> {
        self.say(format!("{} failed: {}", operation, err.msg).as_str())
    }
}

pub fn format_settings(target: &ConnectionTarget, outputs: &OutputVector) -> String {
    format!(
        "IP Address: {}\nPort: {}\nBit States: {}\nProgram Selection: {}",
        target.address,
        target.port,
        outputs,
        outputs.program_selection()
    )
}

/// status block: address, port and bit states, then the link line
pub fn format_status(snapshot: &PanelSnapshot) -> String {
    let health = &snapshot.health;
    let link = if health.consecutive_failures > 0 {
        format!(
            "{}, {} failed writes in a row, last error: {}",
            if snapshot.connected { "connected" } else { "DISCONNECTED, reconnecting" },
            health.consecutive_failures,
            health.last_error.as_deref().unwrap_or("unknown")
        )
    } else if !snapshot.connected {
        String::from("DISCONNECTED, reconnecting (or change the IP address or port)")
    } else {
        format!("connected, {} writes acknowledged", health.successful_writes)
    };
    format!("{}\nLink: {}", format_settings(&snapshot.target, &snapshot.outputs), link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ErrorCode;
    use crate::panel_controller::command::parse_flag;
    use crate::panel_controller::panel_state::LinkHealth;

    fn console(input: &'static str) -> Console<&'static [u8], Vec<u8>> {
        Console::new(input.as_bytes(), Vec::new())
    }

    #[tokio::test]
    async fn test_prompt_reads_lines() {
        let mut console = console("first\n second \n");
        assert_eq!(console.prompt("?").await.unwrap(), "first");
        assert_eq!(console.prompt("?").await.unwrap(), "second");
        assert_eq!(console.prompt("?").await.unwrap_err().code, ErrorCode::ConsoleClosed);
    }

    #[tokio::test]
    async fn test_prompt_valid_retries() {
        let mut console = console("x\n7\n1\n");
        assert!(console.prompt_valid("flag?", parse_flag).await.unwrap());
        let output = String::from_utf8(console.into_writer()).unwrap();
        assert_eq!(output.matches("Please try again.").count(), 2);
    }

    #[tokio::test]
    async fn test_prompt_valid_gives_up() {
        let mut console = console("a\nb\nc\n1\n");
        let err = console.prompt_valid("flag?", parse_flag).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        // the fourth line is left for the next prompt
        assert_eq!(console.prompt("?").await.unwrap(), "1");
    }

    #[test]
    fn test_format_status() {
        let mut outputs = OutputVector::default();
        outputs.set_enable(true);
        outputs.set_program_selection(3).unwrap();
        let snapshot = PanelSnapshot {
            target: ConnectionTarget::new("192.168.1.50", 502),
            outputs,
            connected: true,
            health: LinkHealth::default(),
        };
        let text = format_status(&snapshot);
        assert!(text.contains("IP Address: 192.168.1.50"));
        assert!(text.contains("Port: 502"));
        assert!(text.contains("Bit States: [1, 0, 0, 0, 0, 0, 1, 1]"));
        assert!(text.contains("Program Selection: 3"));
        assert!(text.ends_with("Link: connected, 0 writes acknowledged"));

        let mut health = LinkHealth::default();
        health.record_success();
        health.record_success();
        let snapshot = PanelSnapshot { health, ..snapshot };
        assert!(format_status(&snapshot).ends_with("Link: connected, 2 writes acknowledged"));

        let mut health = LinkHealth::default();
        health.record_failure("Broken pipe (os error 32)");
        let snapshot = PanelSnapshot { connected: false, health, ..snapshot };
        let text = format_status(&snapshot);
        assert!(text.contains("DISCONNECTED, reconnecting, 1 failed writes in a row"));
        assert!(text.ends_with("last error: Broken pipe (os error 32)"));
    }
}
