use anyhow::{Context, Result, bail};
use log::{debug, info, trace};

use crate::aout::Personality;
use crate::cpu::{Cpu, Step};
use crate::process::GuestProcess;
use crate::syscall::Flow;

impl GuestProcess {
    /// Run the loaded image until it exits, returning the guest's status.
    ///
    /// `make_cpu` supplies a fresh core for every start of an image. When
    /// the program counter reaches the end of memory the loop starts over:
    /// on the image an exec just installed, or else on a fresh load of the
    /// current image.
    pub fn run<F>(&mut self, mut make_cpu: F) -> Result<i32>
    where
        F: FnMut(Personality, u32) -> Result<Box<dyn Cpu>>,
    {
        loop {
            let mut cpu = self.start(&mut make_cpu)?;
            let eom = self.memory.end_of_memory();
            while cpu.pc() < eom {
                if let Step::Trap(trap) = cpu.step(&mut self.memory)? {
                    trace!("trap {trap} at {:#x}", cpu.pc());
                    if let Flow::Exit(status) = self.syscall(cpu.as_mut(), trap)? {
                        info!("guest exited with status {status}");
                        return Ok(status);
                    }
                }
            }

            if !self.exec_pending {
                let image = self.image.clone();
                debug!("end of memory reached, reloading {}", image.display());
                self.load_host(&image)
                    .with_context(|| format!("reloading {}", image.display()))?;
            }
        }
    }

    /// Build the initial stack for the current image and position a new
    /// core at its text.
    fn start<F>(&mut self, make_cpu: &mut F) -> Result<Box<dyn Cpu>>
    where
        F: FnMut(Personality, u32) -> Result<Box<dyn Cpu>>,
    {
        let Some(personality) = self.personality() else {
            bail!("no image loaded");
        };
        let entry = self.segments.text_start;
        let mut cpu = make_cpu(personality, entry)?;

        let top = self.stack_top();
        let sp = self.args.push(&mut self.memory, top)?;
        if sp < self.segments.brk {
            bail!(
                "arguments need {:#x} bytes of stack, only {:#x} free above the break",
                top - sp,
                top.saturating_sub(self.segments.brk)
            );
        }
        cpu.set_sp(sp);
        self.exec_pending = false;
        debug!(
            "starting {} at {entry:#x}, sp {sp:#x}, argc {}",
            self.image.display(),
            self.args.argc()
        );

        if let Some(path) = &self.config.dump {
            std::fs::write(path, self.memory.bytes())
                .with_context(|| format!("writing memory dump {}", path.display()))?;
        }
        Ok(cpu)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::os::fd::AsRawFd;

    use super::*;
    use crate::args::ArgBuffer;
    use crate::config::Config;
    use crate::cpu;

    /// `mov #1, r0 ; sys write; buf; 1 ; jmp @#177777` with the byte at
    /// `buf` following the code.
    fn write_then_halt(fd: u16) -> Vec<u8> {
        let text: [u16; 9] = [0o012700, fd, 0o104404, 16, 1, 0o000137, 0o177777, 0, 0];
        let mut file = Vec::new();
        for word in [0o407, 18, 0, 0, 0, 0, 0, 0] {
            file.extend_from_slice(&(word as u16).to_le_bytes());
        }
        for word in text {
            file.extend_from_slice(&word.to_le_bytes());
        }
        // The byte the write call copies out.
        file[16 + 16] = b'x';
        file
    }

    fn process_for(root: &std::path::Path) -> GuestProcess {
        let config = Config {
            root: root.to_path_buf(),
            ..Config::default()
        }
        .validate()
        .unwrap();
        let args = ArgBuffer::from_host(&["/prog"], &[] as &[&str]).unwrap();
        GuestProcess::new(config, args).unwrap()
    }

    #[test]
    fn reaching_end_of_memory_reruns_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let out = std::fs::File::create(dir.path().join("out")).unwrap();
        let image = write_then_halt(out.as_raw_fd() as u16);
        std::fs::write(dir.path().join("prog"), image).unwrap();

        let mut process = process_for(dir.path());
        process.load(b"/prog").unwrap();
        let starts = Cell::new(0);
        let err = process
            .run(|personality, entry| {
                starts.set(starts.get() + 1);
                if starts.get() == 3 {
                    anyhow::bail!("enough");
                }
                cpu::builtin(personality, entry)
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "enough");
        assert_eq!(starts.get(), 3);
        assert_eq!(std::fs::read(dir.path().join("out")).unwrap(), b"xx");
    }

    #[test]
    fn stack_is_built_below_the_reserved_tail() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_then_halt(1);
        std::fs::write(dir.path().join("prog"), image).unwrap();
        let mut process = process_for(dir.path());
        process.load(b"/prog").unwrap();

        let cpu = process
            .start(&mut |personality, entry| cpu::builtin(personality, entry))
            .unwrap();
        assert_eq!(cpu.pc(), 0);
        let sp = cpu.sp();
        assert!(sp < process.stack_top());
        assert_eq!(process.memory.read_word(sp).unwrap(), 1);
    }

    #[test]
    fn dump_snapshots_the_address_space() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prog"), write_then_halt(1)).unwrap();
        let dump = dir.path().join("core");
        let config = Config {
            root: dir.path().to_path_buf(),
            dump: Some(dump.clone()),
            ..Config::default()
        }
        .validate()
        .unwrap();
        let mut process = GuestProcess::new(config, ArgBuffer::default()).unwrap();
        process.load(b"/prog").unwrap();
        process
            .start(&mut |personality, entry| cpu::builtin(personality, entry))
            .unwrap();

        let bytes = std::fs::read(&dump).unwrap();
        assert_eq!(bytes.len(), 0x10000);
        assert_eq!(&bytes[..2], &0o012700u16.to_le_bytes());
    }

    #[test]
    fn running_without_an_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = process_for(dir.path());
        assert!(process.run(cpu::builtin).is_err());
    }
}
