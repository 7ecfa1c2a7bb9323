mod common;

use common::{cfg_block, MockChannel, Op};
use trtool::{Direction, Error, FlashBounds, ProgrammingTarget, TrMcu, TrSeries, TrSession};

fn armed(channel: &mut MockChannel) -> TrSession<'_, MockChannel> {
    let mut session = TrSession::new(channel);
    session.enter().unwrap();
    session
}

fn assert_protocol_error<T: std::fmt::Debug>(result: Result<T, Error>, needle: &str) {
    match result {
        Err(Error::Protocol(message)) => {
            assert!(message.contains(needle), "{message:?} missing {needle:?}")
        }
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[test]
fn selector_combines_target_and_direction() {
    assert_eq!(ProgrammingTarget::Cfg.selector(Direction::Download), 0x00);
    assert_eq!(ProgrammingTarget::Cfg.selector(Direction::Upload), 0x80);
    assert_eq!(ProgrammingTarget::Flash.selector(Direction::Upload), 0x85);
    assert_eq!(
        ProgrammingTarget::ExternalEeprom.selector(Direction::Download),
        0x07
    );
    assert_eq!(ProgrammingTarget::Special.selector(Direction::Upload), 0x88);
}

#[test]
fn operations_require_programming_mode() {
    let mut channel = MockChannel::default();
    let mut session = TrSession::new(&mut channel);
    assert_protocol_error(session.upload_rfpmg(1), "programming mode");
    assert_protocol_error(session.download_cfg(), "programming mode");
    assert!(channel.ops.is_empty());
}

#[test]
fn enter_and_terminate_are_idempotent() {
    let mut channel = MockChannel::default();
    let mut session = TrSession::new(&mut channel);
    session.enter().unwrap();
    session.enter().unwrap();
    assert!(session.is_armed());
    session.terminate().unwrap();
    session.terminate().unwrap();
    assert!(!session.is_armed());
    assert_eq!(channel.ops, vec![Op::Enter, Op::Terminate]);
}

#[test]
fn run_programmed_terminates_after_success() {
    let mut channel = MockChannel::default();
    let mut session = TrSession::new(&mut channel);
    let value = session
        .run_programmed(|s| s.upload_rfband(3).map(|()| 42))
        .unwrap();
    assert_eq!(value, 42);
    assert_eq!(
        channel.ops,
        vec![
            Op::Enter,
            Op::Upload {
                selector: 0x82,
                data: vec![3],
            },
            Op::Terminate,
        ]
    );
}

#[test]
fn run_programmed_terminates_after_failure() {
    let mut channel = MockChannel::default();
    let mut session = TrSession::new(&mut channel);
    let result = session.run_programmed(|s| s.upload_special(&[0; 17]));
    assert_protocol_error(result, "18 bytes");
    assert_eq!(channel.ops, vec![Op::Enter, Op::Terminate]);
}

#[test]
fn flash_upload_sends_word_address() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);
    session.upload_flash(0x7400, &[0x11; 32]).unwrap();

    let mut expected = vec![0x00, 0x3A];
    expected.extend_from_slice(&[0x11; 32]);
    assert_eq!(
        channel.ops[1],
        Op::Upload {
            selector: 0x85,
            data: expected,
        }
    );
}

#[test]
fn flash_upload_rejects_misaligned_address() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);
    assert_protocol_error(session.upload_flash(0x7401, &[0; 32]), "multiple");
}

#[test]
fn flash_upload_accepts_extended_area() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);
    // Byte address 0x5800 is word address 0x2C00, the extended area base.
    session.upload_flash(0x5800, &[0; 32]).unwrap();
}

#[test]
fn flash_upload_rejects_address_outside_areas() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);
    assert_protocol_error(session.upload_flash(0x2000, &[0; 32]), "outside");
}

#[test]
fn flash_upload_rejects_wrong_length() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);
    assert_protocol_error(session.upload_flash(0x7400, &[0; 16]), "32 bytes");
}

#[test]
fn flash_bounds_are_configurable() {
    let mut channel = MockChannel::default();
    let bounds = FlashBounds {
        app: 0x0000..=0xFFFF,
        ext: 0x0000..=0x0000,
    };
    let mut session = TrSession::with_flash_bounds(&mut channel, bounds);
    session.enter().unwrap();
    session.upload_flash(0x2000, &[0; 32]).unwrap();
}

#[test]
fn flash_download_uses_byte_address() {
    let mut channel = MockChannel::default();
    channel.respond(vec![0xAB; 32]);
    let mut session = armed(&mut channel);
    let data = session.download_flash(0x3A00).unwrap();
    assert_eq!(data, vec![0xAB; 32]);
    assert_eq!(
        channel.ops[1],
        Op::Download {
            selector: 0x05,
            request: vec![0x00, 0x3A],
        }
    );
}

#[test]
fn flash_download_rejects_misaligned_address() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);
    assert_protocol_error(session.download_flash(0x3A01), "multiple");
}

#[test]
fn cfg_upload_checks_xor_checksum() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);

    let good = cfg_block();
    session.upload_cfg(&good).unwrap();
    assert_eq!(
        channel.ops[1],
        Op::Upload {
            selector: 0x80,
            data: good.clone(),
        }
    );

    let mut bad = good;
    bad[0] ^= 1;
    let mut session = armed(&mut channel);
    assert_protocol_error(session.upload_cfg(&bad), "checksum");
}

#[test]
fn cfg_upload_rejects_wrong_length() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);
    assert_protocol_error(session.upload_cfg(&[0; 31]), "32 bytes");
}

#[test]
fn cfg_download_validates_response() {
    let mut channel = MockChannel::default();
    channel.respond(cfg_block());
    let mut session = armed(&mut channel);
    assert_eq!(session.download_cfg().unwrap(), cfg_block());

    channel.respond(vec![0; 32]);
    let mut session = armed(&mut channel);
    assert_protocol_error(session.download_cfg(), "checksum");

    channel.respond(vec![0; 31]);
    let mut session = armed(&mut channel);
    assert_protocol_error(session.download_cfg(), "length");
}

#[test]
fn rfpmg_download_requires_single_byte_response() {
    let mut channel = MockChannel::default();
    channel.respond(vec![7]);
    let mut session = armed(&mut channel);
    assert_eq!(session.download_rfpmg().unwrap(), 7);

    channel.respond(vec![1, 2]);
    let mut session = armed(&mut channel);
    assert_protocol_error(session.download_rfpmg(), "malformed");
}

#[test]
fn access_pwd_and_user_key_require_16_bytes() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);
    session.upload_access_pwd(&[1; 16]).unwrap();
    session.upload_user_key(&[2; 16]).unwrap();
    assert_protocol_error(session.upload_access_pwd(&[0; 15]), "16 bytes");
    assert_protocol_error(session.upload_user_key(&[0; 17]), "16 bytes");
}

#[test]
fn internal_eeprom_upload_checks_bounds() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);

    // 0xA0 + 31 = 0xBF, still addressable
    session.upload_internal_eeprom(0xA0, &[0; 31]).unwrap();
    assert_eq!(
        channel.ops[1],
        Op::Upload {
            selector: 0x86,
            data: {
                let mut msg = vec![0xA0, 0x00];
                msg.extend_from_slice(&[0; 31]);
                msg
            },
        }
    );

    let mut session = armed(&mut channel);
    assert_protocol_error(session.upload_internal_eeprom(0xC0, &[0; 1]), "range");
    assert_protocol_error(
        session.upload_internal_eeprom(0xB0, &[0; 32]),
        "addressable",
    );
    assert_protocol_error(session.upload_internal_eeprom(0x00, &[]), "1 to 32");
    assert_protocol_error(session.upload_internal_eeprom(0x00, &[0; 33]), "1 to 32");
}

#[test]
fn internal_eeprom_download_requires_32_byte_response() {
    let mut channel = MockChannel::default();
    channel.respond(vec![5; 32]);
    let mut session = armed(&mut channel);
    assert_eq!(session.download_internal_eeprom(0xA0).unwrap(), vec![5; 32]);

    let mut session = armed(&mut channel);
    assert_protocol_error(session.download_internal_eeprom(0xA1), "range");

    channel.respond(vec![5; 16]);
    let mut session = armed(&mut channel);
    assert_protocol_error(session.download_internal_eeprom(0x00), "32 bytes");
}

#[test]
fn external_eeprom_bounds_differ_per_direction() {
    let mut channel = MockChannel::default();
    channel.respond(vec![1; 32]);
    let mut session = armed(&mut channel);

    session.upload_external_eeprom(0x3FE0, &[0; 32]).unwrap();
    assert_protocol_error(session.upload_external_eeprom(0x4000, &[0; 32]), "range");
    assert_protocol_error(session.upload_external_eeprom(0x10, &[0; 32]), "multiple");
    assert_protocol_error(session.upload_external_eeprom(0x20, &[0; 16]), "32 bytes");

    session.download_external_eeprom(0x7FE0).unwrap();
    assert_protocol_error(session.download_external_eeprom(0x8000), "range");
}

#[test]
fn special_upload_requires_18_bytes() {
    let mut channel = MockChannel::default();
    let mut session = armed(&mut channel);
    session.upload_special(&[9; 18]).unwrap();
    assert_eq!(
        channel.ops[1],
        Op::Upload {
            selector: 0x88,
            data: vec![9; 18],
        }
    );
}

#[test]
fn module_info_is_decoded() {
    let mut channel = MockChannel::default();
    let mut session = TrSession::new(&mut channel);
    let info = session.module_info().unwrap();
    assert_eq!(info.mcu, TrMcu::Pic16f1938);
    assert_eq!(info.series, TrSeries::Dctr7xD);
    assert_eq!(info.os_version, 0x43);
    assert_eq!(info.os_build, 0x0808);
}

#[test]
fn module_info_rejects_unknown_mcu() {
    let mut channel = MockChannel::default();
    channel.info.pic_type = 0x25;
    let mut session = TrSession::new(&mut channel);
    assert_protocol_error(session.module_info(), "unknown MCU");
}

#[test]
fn module_info_rejects_unknown_series() {
    let mut channel = MockChannel::default();
    channel.info.pic_type = 0x4C;
    let mut session = TrSession::new(&mut channel);
    assert_protocol_error(session.module_info(), "unknown module series");
}

#[test]
fn module_info_assembles_build_little_endian() {
    let mut channel = MockChannel::default();
    channel.info.os_build = [0x34, 0x12];
    let mut session = TrSession::new(&mut channel);
    assert_eq!(session.module_info().unwrap().os_build, 0x1234);
}
