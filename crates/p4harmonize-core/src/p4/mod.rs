//! Perforce command plumbing: connection flags, client and changelist
//! management, and `-ztag` output parsing.

pub mod ztag;

use crate::config::DestinationConfig;
use crate::error::Error;
use crate::process::{CommandOutput, ToolCommand};
use tracing::{debug, info};

pub use ztag::{parse_ztag, ZtagRecord};

const CLIENT_OPTIONS: &str = "noallwrite noclobber nocompress unlocked modtime rmdir noaltsync";
const CLIENT_SUBMIT_OPTIONS: &str = "leaveunchanged";

/// Connection parameters passed explicitly to every `p4` invocation, so
/// nothing depends on the caller's P4CONFIG or environment.
#[derive(Debug, Clone)]
pub struct P4Connection {
    program: String,
    port: String,
    user: String,
    client: String,
}

impl P4Connection {
    pub fn new(destination: &DestinationConfig) -> Self {
        Self {
            program: destination
                .p4_program
                .clone()
                .unwrap_or_else(|| "p4".to_string()),
            port: destination.p4port.clone(),
            user: destination.p4user.clone(),
            client: destination.p4client.clone(),
        }
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    /// `p4 -p <port> -u <user> -c <client>`, ready for more arguments.
    pub fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.program).args([
            "-p",
            self.port.as_str(),
            "-u",
            self.user.as_str(),
            "-c",
            self.client.as_str(),
        ])
    }

    /// Run a `-ztag` command and parse its stdout. Stderr is left to the caller.
    pub fn run_ztag<I, S>(&self, args: I) -> Result<(Vec<ZtagRecord>, CommandOutput), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let output = self.command().arg("-ztag").args(args).output()?;
        let records = parse_ztag(&output.stdout_text());
        Ok((records, output))
    }

    /// Whether the server treats client paths case-sensitively.
    pub fn is_case_sensitive(&self) -> Result<bool, Error> {
        let (records, output) = self.run_ztag(["info"])?;
        let case = records
            .iter()
            .find_map(|r| r.get("clientCase"))
            .ok_or_else(|| Error::Command {
                command: "p4 info".to_string(),
                message: format!("no clientCase in output: {}", output.stderr.trim()),
            })?;
        debug!("Server clientCase: {}", case);
        Ok(case != "insensitive")
    }

    pub fn client_exists(&self) -> Result<bool, Error> {
        let (records, output) = self.run_ztag(["clients", "-e", self.client.as_str()])?;
        if !output.success() {
            return Err(Error::Command {
                command: "p4 clients".to_string(),
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(records
            .iter()
            .any(|r| r.get("client").map(String::as_str) == Some(self.client.as_str())))
    }

    /// Create a stream client rooted at `root` with `leaveunchanged` submit
    /// options and `modtime rmdir` workspace options.
    pub fn create_stream_client(&self, root: &str, stream: &str) -> Result<(), Error> {
        info!("Creating p4 client {}", self.client);
        let template = self
            .command()
            .args(["client", "-S", stream, "-o", self.client.as_str()])
            .output_checked()?
            .stdout_text();

        let mut spec = set_spec_field(&template, "Root", root);
        spec = set_spec_field(&spec, "Options", CLIENT_OPTIONS);
        spec = set_spec_field(&spec, "SubmitOptions", CLIENT_SUBMIT_OPTIONS);
        spec = set_spec_field(&spec, "Stream", stream);

        self.command()
            .args(["client", "-i"])
            .stdin(spec)
            .output_checked()?;
        Ok(())
    }

    /// Force-delete the client. Returns false when it did not exist.
    pub fn delete_client(&self) -> Result<bool, Error> {
        if !self.client_exists()? {
            info!("Client not found: {}", self.client);
            return Ok(false);
        }
        info!("Deleting client: {}", self.client);
        self.command()
            .args(["client", "-df", self.client.as_str()])
            .output_checked()?;
        Ok(true)
    }

    /// Mark every file in `depot_path` as synced at head without transferring it.
    pub fn flush(&self, depot_path: &str) -> Result<(), Error> {
        let output = self.command().args(["flush", depot_path]).output()?;
        if !output.success() && !is_benign_warning(&output.stderr) {
            return Err(Error::Command {
                command: format!("p4 flush {}", depot_path),
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Create a numbered pending changelist and return its number.
    pub fn create_changelist(&self, description: &str) -> Result<u32, Error> {
        let spec = changelist_spec(&self.client, &self.user, description);
        let stdout = self
            .command()
            .args(["change", "-i"])
            .stdin(spec)
            .output_checked()?
            .stdout_text();
        parse_created_change(&stdout).ok_or_else(|| Error::Command {
            command: "p4 change -i".to_string(),
            message: format!("unexpected output: {}", stdout.trim()),
        })
    }
}

/// Warnings p4 prints for an empty or already up-to-date path set.
pub fn is_benign_warning(stderr: &str) -> bool {
    let stderr = stderr.trim();
    !stderr.is_empty()
        && stderr.lines().all(|line| {
            line.contains("no such file(s)")
                || line.contains("file(s) up-to-date")
                || line.contains("no file(s) to reconcile")
        })
}

/// Replace (or append) a single-line field in a p4 spec form.
pub fn set_spec_field(spec: &str, field: &str, value: &str) -> String {
    let prefix = format!("{}:", field);
    let replacement = format!("{}:\t{}", field, value);
    let mut found = false;

    let mut lines: Vec<String> = spec
        .lines()
        .map(|line| {
            if line.starts_with(&prefix) {
                found = true;
                replacement.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !found {
        lines.push(String::new());
        lines.push(replacement);
    }

    let mut result = lines.join("\n");
    result.push('\n');
    result
}

pub fn changelist_spec(client: &str, user: &str, description: &str) -> String {
    let mut spec = format!(
        "Change:\tnew\n\nClient:\t{}\n\nUser:\t{}\n\nStatus:\tnew\n\nDescription:\n",
        client, user
    );
    for line in description.lines() {
        spec.push('\t');
        spec.push_str(line);
        spec.push('\n');
    }
    spec
}

/// Changelist number from `Change 1234 created.`
pub fn parse_created_change(stdout: &str) -> Option<u32> {
    stdout.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("Change"), Some(number), Some("created" | "created.")) => number.parse().ok(),
            _ => None,
        }
    })
}

/// Escape the characters p4 reads as wildcards or revision specifiers.
pub fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '@' => escaped.push_str("%40"),
            '#' => escaped.push_str("%23"),
            '*' => escaped.push_str("%2A"),
            _ => escaped.push(c),
        }
    }
    escaped
}
