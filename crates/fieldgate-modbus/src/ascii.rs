// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus ASCII transport.
//!
//! tokio-modbus frames SOCKET and RTU but has no ASCII codec, so this
//! transport carries its own. An ASCII frame is
//!
//! ```text
//! ':' <hex(unit)> <hex(pdu bytes...)> <hex(lrc)> CR LF
//! ```
//!
//! where the LRC is the two's complement of the byte sum of unit + PDU.
//! Only the function codes the middleware issues are implemented: reads
//! FC 01-04 and single-item writes FC 05/06.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use fieldgate_core::types::{GatewayKey, RegisterType};

use crate::error::{ClientError, ClientResult};
use crate::transport::{ModbusTransport, Operation};

/// Upper bound on an ASCII response line; the largest valid response
/// (125 registers: unit + fc + byte count + 250 data bytes + LRC) is
/// 2*255 + 3 = 513 characters including ':' and CR LF.
const MAX_FRAME_LEN: usize = 513;

// =============================================================================
// Frame codec
// =============================================================================

/// Two's complement LRC over raw (pre-hex) bytes.
fn lrc(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0u8.wrapping_sub(sum)
}

fn push_hex(out: &mut Vec<u8>, byte: u8) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    out.push(HEX[usize::from(byte >> 4)]);
    out.push(HEX[usize::from(byte & 0x0F)]);
}

fn hex_value(ch: u8) -> ClientResult<u8> {
    match ch {
        b'0'..=b'9' => Ok(ch - b'0'),
        b'A'..=b'F' => Ok(ch - b'A' + 10),
        b'a'..=b'f' => Ok(ch - b'a' + 10),
        other => Err(ClientError::frame(format!(
            "invalid hex character 0x{other:02X}"
        ))),
    }
}

/// Encodes `unit` + `pdu` into a full ASCII frame.
fn encode_frame(unit: u8, pdu: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(pdu.len() + 2);
    raw.push(unit);
    raw.extend_from_slice(pdu);
    raw.push(lrc(&raw[..]));

    let mut out = Vec::with_capacity(raw.len() * 2 + 3);
    out.push(b':');
    for byte in raw {
        push_hex(&mut out, byte);
    }
    out.extend_from_slice(b"\r\n");
    out
}

/// Decodes one ASCII line into `(unit, pdu)` after LRC verification.
fn decode_frame(line: &[u8]) -> ClientResult<(u8, Vec<u8>)> {
    let line = strip_line_ending(line);

    if line.first() != Some(&b':') {
        return Err(ClientError::frame("response does not start with ':'"));
    }
    let hex = &line[1..];
    if hex.len() % 2 != 0 {
        return Err(ClientError::frame("odd number of hex characters"));
    }

    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for pair in hex.chunks_exact(2) {
        bytes.push((hex_value(pair[0])? << 4) | hex_value(pair[1])?);
    }

    // unit + function + lrc is the minimum well-formed frame.
    if bytes.len() < 3 {
        return Err(ClientError::frame("frame too short"));
    }

    let (payload, checksum) = bytes.split_at(bytes.len() - 1);
    if lrc(payload) != checksum[0] {
        return Err(ClientError::frame(format!(
            "LRC mismatch: expected 0x{:02X}, got 0x{:02X}",
            lrc(payload),
            checksum[0]
        )));
    }

    Ok((payload[0], payload[1..].to_vec()))
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Builds the request PDU for an operation.
fn build_pdu(operation: Operation) -> ClientResult<Vec<u8>> {
    match operation {
        Operation::Read {
            register_type,
            address,
            count,
        } => Ok(vec![
            register_type.read_function_code(),
            (address >> 8) as u8,
            (address & 0xFF) as u8,
            (count >> 8) as u8,
            (count & 0xFF) as u8,
        ]),
        Operation::Write {
            register_type,
            address,
            value,
        } => {
            let function = register_type
                .write_function_code()
                .ok_or_else(|| ClientError::frame(format!("{register_type} is read-only")))?;
            let wire_value = match register_type {
                // FC 05 encodes ON as 0xFF00 and OFF as 0x0000.
                RegisterType::Coil => {
                    if value != 0 {
                        0xFF00
                    } else {
                        0x0000
                    }
                }
                _ => value,
            };
            Ok(vec![
                function,
                (address >> 8) as u8,
                (address & 0xFF) as u8,
                (wire_value >> 8) as u8,
                (wire_value & 0xFF) as u8,
            ])
        }
    }
}

/// Interprets a response PDU against the request that produced it.
fn parse_response(operation: Operation, pdu: &[u8]) -> ClientResult<Vec<u16>> {
    let request_function = match operation {
        Operation::Read { register_type, .. } => register_type.read_function_code(),
        Operation::Write { register_type, .. } => register_type
            .write_function_code()
            .ok_or_else(|| ClientError::frame(format!("{register_type} is read-only")))?,
    };

    let function = *pdu
        .first()
        .ok_or_else(|| ClientError::frame("empty response PDU"))?;

    if function == request_function | 0x80 {
        let code = pdu
            .get(1)
            .copied()
            .ok_or_else(|| ClientError::frame("exception response without code"))?;
        return Err(ClientError::Exception {
            function: request_function,
            code,
        });
    }
    if function != request_function {
        return Err(ClientError::frame(format!(
            "function echo mismatch: sent 0x{request_function:02X}, got 0x{function:02X}"
        )));
    }

    match operation {
        Operation::Read {
            register_type,
            count,
            ..
        } => {
            let byte_count = usize::from(
                *pdu.get(1)
                    .ok_or_else(|| ClientError::frame("read response without byte count"))?,
            );
            let data = pdu
                .get(2..2 + byte_count)
                .ok_or_else(|| ClientError::frame("read response shorter than byte count"))?;

            if register_type.is_bit() {
                // Bits are packed LSB-first.
                if byte_count < (usize::from(count) + 7) / 8 {
                    return Err(ClientError::frame("bit response shorter than requested"));
                }
                Ok((0..usize::from(count))
                    .map(|i| u16::from(data[i / 8] >> (i % 8) & 1))
                    .collect())
            } else {
                if byte_count != usize::from(count) * 2 {
                    return Err(ClientError::frame(format!(
                        "register response byte count {byte_count} does not match count {count}"
                    )));
                }
                Ok(data
                    .chunks_exact(2)
                    .map(|pair| (u16::from(pair[0]) << 8) | u16::from(pair[1]))
                    .collect())
            }
        }
        // FC 05/06 echo address and value; the echo passed the LRC check,
        // which is all the confirmation needed.
        Operation::Write { .. } => Ok(Vec::new()),
    }
}

// =============================================================================
// AsciiTransport
// =============================================================================

/// Modbus ASCII over a gateway TCP stream.
pub struct AsciiTransport {
    key: GatewayKey,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl AsciiTransport {
    /// Creates a disconnected transport.
    pub fn new(key: GatewayKey, connect_timeout: Duration) -> Self {
        Self {
            key,
            connect_timeout,
            stream: None,
        }
    }

    async fn read_frame(stream: &mut TcpStream) -> ClientResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(64);
        loop {
            let mut chunk = [0u8; 64];
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| ClientError::io(e.to_string()))?;
            if n == 0 {
                return Err(ClientError::io("connection closed mid-frame"));
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.contains(&b'\n') {
                return Ok(buf);
            }
            if buf.len() > MAX_FRAME_LEN {
                return Err(ClientError::frame("response exceeds maximum frame length"));
            }
        }
    }
}

#[async_trait]
impl ModbusTransport for AsciiTransport {
    async fn connect(&mut self) -> ClientResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = self.key.to_string();
        let stream = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                ClientError::connect(format!(
                    "connect to {addr} timed out after {:?}",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| ClientError::connect(format!("connect to {addr} failed: {e}")))?;

        stream.set_nodelay(true).ok();
        self.stream = Some(stream);

        tracing::info!(gateway = %self.key, framer = "ASCII", "connected to modbus gateway");
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(gateway = %self.key, "disconnected from modbus gateway");
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn execute(&mut self, slave_id: u8, operation: Operation) -> ClientResult<Vec<u16>> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;

        let pdu = build_pdu(operation)?;
        let frame = encode_frame(slave_id, &pdu);
        stream
            .write_all(&frame)
            .await
            .map_err(|e| ClientError::io(e.to_string()))?;

        let line = Self::read_frame(stream).await?;
        let (unit, response_pdu) = decode_frame(&line)?;
        if unit != slave_id {
            return Err(ClientError::frame(format!(
                "unit echo mismatch: sent {slave_id}, got {unit}"
            )));
        }

        parse_response(operation, &response_pdu)
    }

    fn describe(&self) -> String {
        format!("modbus ascii {}", self.key)
    }
}

impl std::fmt::Debug for AsciiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsciiTransport")
            .field("gateway", &self.key.to_string())
            .field("connected", &self.is_connected())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
