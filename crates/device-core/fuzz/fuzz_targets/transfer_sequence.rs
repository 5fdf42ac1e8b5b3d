#![no_main]

use device_core::{
    decode_word, validate_read_len, validate_write_len, RegisterFile, RegisterPort, StatusFlags,
};
use libfuzzer_sys::fuzz_target;

// Each chunk is one transfer: a length byte selects the buffer size, the low
// bit of the tag byte selects read or write.
fuzz_target!(|data: &[u8]| {
    let Ok(mut regs) = RegisterFile::initialize() else {
        return;
    };

    let mut rest = data;
    while let [tag, len, tail @ ..] = rest {
        let len = usize::from(*len % 8);
        let take = len.min(tail.len());
        let (chunk, next) = tail.split_at(take);
        rest = next;

        if tag & 1 == 0 {
            let mut dst = vec![0_u8; len];
            let read = regs.read_status(&mut dst);
            assert_eq!(read.is_ok(), len >= 4);
            assert_eq!(validate_read_len(len).is_ok(), len >= 4);
        } else {
            let before = regs.snapshot();
            let write = regs.write_control(chunk);
            assert_eq!(write.is_ok(), validate_write_len(chunk.len()).is_ok());
            assert_eq!(write.is_ok(), chunk.len() >= 4);
            match write {
                Ok(consumed) => {
                    assert_eq!(consumed, 4);
                    assert_eq!(Ok(regs.control()), decode_word(chunk));
                }
                Err(_) => assert_eq!(regs.snapshot(), before),
            }
        }

        let status = regs.status();
        assert!(status == StatusFlags::READY || status == StatusFlags::BUSY);
    }
});
