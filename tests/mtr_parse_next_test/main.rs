use bolero::check;
use btrcore::{
    mtr::Mtr,
    mtr0types::MtrOperation,
    ring::RingReader,
};

fn main() {
    check!().with_type().for_each(|lsn: &u64| {
        let hdr_size = 0u64;
        let capacity = 0x1_0000u64;
        let lsn = lsn % (capacity * 4);

        let mut buf0 = Vec::new();
        if Mtr::build_file_checkpoint(&mut buf0, hdr_size, capacity, lsn).is_err() {
            return;
        }

        // lay the record out into a ring buffer at its wrapped position,
        // mirroring what a real log file looks like around the wrap point.
        let mut buf = vec![0u8; capacity as usize];
        let offset = (lsn % capacity) as usize;
        let tail = (capacity as usize - offset).min(buf0.len());
        buf[offset..offset + tail].copy_from_slice(&buf0[..tail]);
        if tail < buf0.len() {
            buf[..buf0.len() - tail].copy_from_slice(&buf0[tail..]);
        }

        let r0 = RingReader::buf_at(buf.as_slice(), hdr_size as usize, lsn as usize);
        let mtr = match Mtr::parse_next(&mut r0.clone()) {
            Ok(mtr) => mtr,
            Err(_) => return,
        };

        assert_eq!(mtr.op, MtrOperation::FileCheckpoint);
        assert_eq!(mtr.space_id, 0);
        assert_eq!(mtr.page_no, 0);
        assert_eq!(mtr.file_checkpoint_lsn, Some(lsn));
    });
}
