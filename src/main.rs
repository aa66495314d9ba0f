use clap::Parser;
use log::info;

use btrcore::config::{Command, Config};
use btrcore::log as redo_log;
use btrcore::mtr0types::MtrOperation;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::parse();
    let path = config.get_log_file_path()?;
    let log = redo_log::Redo::open(&path)?;

    let header = log.header();
    info!(
        "opened redo log {} (format {:#x}, first_lsn {})",
        path.display(),
        header.format,
        header.first_lsn
    );

    match config.command.unwrap_or_default() {
        Command::Inspect => inspect(&log),
        Command::DumpRedo => dump_redo(&log),
    }
}

fn inspect(log: &redo_log::Redo) -> anyhow::Result<()> {
    let header = log.header();
    let checkpoint = log.checkpoint();

    println!(
        "format: {:#x}  first_lsn: {}  encrypted: {}",
        header.format, header.first_lsn, header.encrypted
    );
    println!(
        "checkpoint_lsn: {:?}  end_lsn: {}",
        checkpoint.checkpoint_lsn, checkpoint.end_lsn
    );
    println!(
        "header bytes: {}",
        log.buf()[0..32]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    );

    Ok(())
}

fn dump_redo(log: &redo_log::Redo) -> anyhow::Result<()> {
    let mut reader = log.reader();
    let mut n = 0usize;

    loop {
        let chain = match reader.parse_next() {
            Ok(chain) => chain,
            Err(err) => {
                if let Some(err) = err.downcast_ref::<std::io::Error>()
                    && err.kind() == std::io::ErrorKind::NotFound
                {
                    break;
                }
                return Err(err);
            }
        };

        for mtr in chain.mtr {
            n += 1;
            match mtr.op {
                MtrOperation::FileCheckpoint => {
                    println!(
                        "#{n} FILE_CHECKPOINT lsn={:?} len={}",
                        mtr.file_checkpoint_lsn,
                        mtr.len()
                    );
                }
                op => {
                    println!(
                        "#{n} {op:?} space={} page={} len={}",
                        mtr.space_id,
                        mtr.page_no,
                        mtr.len()
                    );
                }
            }
        }
    }

    info!("dumped {n} mini-transaction record(s)");
    Ok(())
}
