//! Scripted submission server for integration tests.
//!
//! The server runs on a plain thread with blocking sockets so that it serves
//! both async tests and the blocking `submit` path. It accepts a single
//! connection and records every line the client sends.

#![allow(dead_code, clippy::unwrap_used)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How the mock server answers.
#[derive(Debug, Clone)]
pub struct Script {
    /// Greeting line.
    pub greeting: String,
    /// Recipients refused at RCPT with `550`.
    pub refused: Vec<String>,
    /// Acknowledgment after DATA; `{n}` is replaced by the transaction number.
    pub ack: String,
    /// Reply to AUTH.
    pub auth: String,
    /// Reply to the n-th `MAIL FROM` (1-based) instead of accepting it.
    pub mail_reply: Option<(usize, String)>,
    /// Close the connection on the n-th `MAIL FROM` (1-based).
    pub hang_up_on_mail: Option<usize>,
    /// Read the content, then stay silent this long instead of acknowledging.
    pub stall_after_data: Option<Duration>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: "220 mock.domain.tld PowerMTA ready".into(),
            refused: Vec::new(),
            ack: "250 2.6.0 ok id=Q{n}".into(),
            auth: "235 2.7.0 authenticated".into(),
            mail_reply: None,
            hang_up_on_mail: None,
            stall_after_data: None,
        }
    }
}

impl Script {
    pub fn refuse(mut self, recipient: &str) -> Self {
        self.refused.push(recipient.to_string());
        self
    }

    pub fn ack(mut self, ack: &str) -> Self {
        self.ack = ack.to_string();
        self
    }

    pub fn mail_reply(mut self, nth: usize, reply: &str) -> Self {
        self.mail_reply = Some((nth, reply.to_string()));
        self
    }

    pub const fn hang_up_on_mail(mut self, nth: usize) -> Self {
        self.hang_up_on_mail = Some(nth);
        self
    }

    pub const fn stall_after_data(mut self, pause: Duration) -> Self {
        self.stall_after_data = Some(pause);
        self
    }
}

/// A running mock server.
pub struct MockServer {
    pub port: u16,
    handle: JoinHandle<Vec<String>>,
}

impl MockServer {
    pub fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || serve(&listener, &script));
        Self { port, handle }
    }

    /// Waits for the client to disconnect and returns the transcript.
    pub fn transcript(self) -> Vec<String> {
        self.handle.join().unwrap()
    }
}

fn serve(listener: &TcpListener, script: &Script) -> Vec<String> {
    let (socket, _) = listener.accept().unwrap();
    let mut writer = socket.try_clone().unwrap();
    let mut reader = BufReader::new(socket);
    let mut transcript = Vec::new();
    let mut transactions = 0;
    let mut mails = 0;

    reply(&mut writer, &script.greeting);

    let mut in_data = false;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let cmd = line.trim_end_matches(['\r', '\n']).to_string();
        transcript.push(cmd.clone());

        if in_data {
            if cmd == "." {
                in_data = false;
                if let Some(pause) = script.stall_after_data {
                    thread::sleep(pause);
                    break;
                }
                transactions += 1;
                reply(&mut writer, &script.ack.replace("{n}", &transactions.to_string()));
            }
            continue;
        }

        let verb = cmd.split([' ', ':']).next().unwrap_or("").to_ascii_uppercase();
        match verb.as_str() {
            "EHLO" => reply(&mut writer, "250-mock.domain.tld hello\r\n250-8BITMIME\r\n250 AUTH PLAIN"),
            "AUTH" => reply(&mut writer, &script.auth),
            "MAIL" => {
                mails += 1;
                if script.hang_up_on_mail == Some(mails) {
                    break;
                }
                match &script.mail_reply {
                    Some((nth, text)) if *nth == mails => reply(&mut writer, text),
                    _ => reply(&mut writer, "250 2.0.0 ok"),
                }
            }
            "RSET" => reply(&mut writer, "250 2.0.0 ok"),
            "RCPT" => {
                let refused = script
                    .refused
                    .iter()
                    .any(|r| cmd.contains(&format!("<{r}>")));
                if refused {
                    reply(&mut writer, "550 5.1.1 no such user");
                } else {
                    reply(&mut writer, "250 2.1.5 ok");
                }
            }
            "DATA" => {
                in_data = true;
                reply(&mut writer, "354 start mail input");
            }
            "QUIT" => {
                reply(&mut writer, "221 2.0.0 bye");
                break;
            }
            _ => reply(&mut writer, "500 5.5.1 unrecognized command"),
        }
    }

    transcript
}

fn reply(writer: &mut TcpStream, text: &str) {
    writer.write_all(text.as_bytes()).unwrap();
    writer.write_all(b"\r\n").unwrap();
    writer.flush().unwrap();
}
