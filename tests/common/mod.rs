#![allow(dead_code)]

use std::collections::VecDeque;
use trtool::{Channel, Error, RawModuleInfo, Result};

/// One recorded channel call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Enter,
    Terminate,
    Upload { selector: u8, data: Vec<u8> },
    Download { selector: u8, request: Vec<u8> },
    ModuleInfo,
}

/// Transaction-level fake of a transport: records every call and replays
/// canned download responses in order.
pub struct MockChannel {
    pub ops: Vec<Op>,
    pub responses: VecDeque<Vec<u8>>,
    pub info: RawModuleInfo,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self {
            ops: Vec::new(),
            responses: VecDeque::new(),
            // DCTR-7xD module with a PIC16F1938
            info: RawModuleInfo {
                os_version: 0x43,
                os_build: [0x08, 0x08],
                pic_type: 0x24,
            },
        }
    }
}

impl MockChannel {
    pub fn respond(&mut self, data: Vec<u8>) {
        self.responses.push_back(data);
    }
}

impl Channel for MockChannel {
    fn enter_programming_mode(&mut self) -> Result<()> {
        self.ops.push(Op::Enter);
        Ok(())
    }

    fn terminate_programming_mode(&mut self) -> Result<()> {
        self.ops.push(Op::Terminate);
        Ok(())
    }

    fn upload(&mut self, selector: u8, data: &[u8]) -> Result<()> {
        self.ops.push(Op::Upload {
            selector,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn download(&mut self, selector: u8, request: &[u8]) -> Result<Vec<u8>> {
        self.ops.push(Op::Download {
            selector,
            request: request.to_vec(),
        });
        self.responses
            .pop_front()
            .ok_or_else(|| Error::protocol("mock channel has no queued response"))
    }

    fn module_info(&mut self) -> Result<RawModuleInfo> {
        self.ops.push(Op::ModuleInfo);
        Ok(self.info)
    }
}

/// A 32-byte HWP configuration block with a valid leading checksum byte.
pub fn cfg_block() -> Vec<u8> {
    let mut data: Vec<u8> = (0..32u8).collect();
    data[0] = data[1..].iter().fold(0x5F, |acc, b| acc ^ b);
    data
}

/// Format one hex record line (start code, bytes, trailing checksum).
pub fn record_line(bytes: &[u8]) -> String {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    let mut line = String::from(":");
    for b in bytes {
        line.push_str(&format!("{b:02X}"));
    }
    line.push_str(&format!("{:02X}", 0u8.wrapping_sub(sum)));
    line
}
