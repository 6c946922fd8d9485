//! VCD (Value Change Dump) waveform sink following IEEE 1364.
//!
//! Produces human-readable text output viewable in GTKWave, Surfer, or any
//! other waveform viewer. Signal identifiers use printable ASCII characters
//! starting from `!` (0x21). One scope level is emitted, named after the
//! model.
//!
//! The sink is change-driven: a `#<time>` marker is written only when the
//! timestamp advances, and a signal value only when it differs from the
//! previously recorded one, so repeated samples at the same timestamp cost
//! nothing. Output is flushed after every sample.

use std::io::Write;

use cosim_abi::{ModelDescriptor, Timescale};

use crate::error::BridgeError;
use crate::trace::WaveformSink;

/// One registered signal: name, width, and VCD identifier code.
struct Var {
    name: &'static str,
    width: u32,
    id: String,
}

/// VCD-format implementation of [`WaveformSink`].
pub struct VcdSink<W: Write> {
    writer: W,
    model: &'static str,
    timescale: Timescale,
    vars: Vec<Var>,
    /// Last recorded value per signal, in declaration order.
    last: Vec<u64>,
    current_time: u64,
    opened: bool,
}

impl<W: Write> VcdSink<W> {
    /// Creates a sink for the descriptor's port table, writing to `writer`.
    pub fn new(writer: W, descriptor: &ModelDescriptor) -> Self {
        let vars = descriptor
            .ports
            .iter()
            .enumerate()
            .map(|(i, decl)| Var {
                name: decl.name,
                width: decl.width,
                id: Self::make_id_code(i as u32),
            })
            .collect();
        Self {
            writer,
            model: descriptor.name,
            timescale: descriptor.timescale,
            vars,
            last: Vec::new(),
            current_time: 0,
            opened: false,
        }
    }

    /// Generates a VCD identifier code from a sequential index.
    ///
    /// Uses printable ASCII characters starting from `!` (0x21), with
    /// multi-character codes for indices >= 94.
    fn make_id_code(index: u32) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            let c = (b'!' + (idx % 94) as u8) as char;
            result.push(c);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    /// Truncates a value to the declared signal width.
    fn masked(value: u64, width: u32) -> u64 {
        if width >= 64 {
            value
        } else {
            value & ((1u64 << width) - 1)
        }
    }

    fn write_value(&mut self, index: usize, value: u64) -> Result<(), BridgeError> {
        let var = &self.vars[index];
        if var.width == 1 {
            writeln!(self.writer, "{}{}", value & 1, var.id)?;
        } else {
            writeln!(self.writer, "b{:b} {}", Self::masked(value, var.width), var.id)?;
        }
        Ok(())
    }
}

impl<W: Write> WaveformSink for VcdSink<W> {
    fn open(&mut self, values: &[u64]) -> Result<(), BridgeError> {
        writeln!(self.writer, "$date")?;
        writeln!(self.writer, "  Per-step simulation trace")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  cosim bridge")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  {}", self.timescale)?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$scope module {} $end", self.model)?;
        for var in &self.vars {
            writeln!(
                self.writer,
                "$var wire {} {} {} $end",
                var.width, var.id, var.name
            )?;
        }
        writeln!(self.writer, "$upscope $end")?;
        writeln!(self.writer, "$enddefinitions $end")?;

        // Baseline snapshot at time zero.
        writeln!(self.writer, "#0")?;
        writeln!(self.writer, "$dumpvars")?;
        for (i, &value) in values.iter().enumerate() {
            self.write_value(i, value)?;
        }
        writeln!(self.writer, "$end")?;
        self.writer.flush()?;

        self.last = values.to_vec();
        self.current_time = 0;
        self.opened = true;
        Ok(())
    }

    fn sample(&mut self, time: u64, values: &[u64]) -> Result<(), BridgeError> {
        debug_assert!(self.opened, "sample before open");
        debug_assert!(time >= self.current_time, "trace time went backwards");

        if time > self.current_time {
            writeln!(self.writer, "#{time}")?;
            self.current_time = time;
        }
        for (i, &value) in values.iter().enumerate() {
            if self.last[i] != value {
                self.write_value(i, value)?;
                self.last[i] = value;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BridgeError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_abi::{
        KernelPtr, KernelVTable, PortDecl, PortDirection, ReleasePolicy, TimeUnit,
        DEFAULT_TRACE_QUANTUM,
    };

    unsafe extern "C" fn stub_alloc() -> KernelPtr {
        std::ptr::null_mut()
    }

    unsafe extern "C" fn stub_op(_kernel: KernelPtr) {}

    static PORTS: [PortDecl; 3] = [
        PortDecl {
            name: "clk",
            direction: PortDirection::Input,
            width: 1,
            offset: 0,
        },
        PortDecl {
            name: "bus",
            direction: PortDirection::Output,
            width: 4,
            offset: 4,
        },
        PortDecl {
            name: "wide",
            direction: PortDirection::Output,
            width: 40,
            offset: 8,
        },
    ];

    static DESCRIPTOR: ModelDescriptor = ModelDescriptor {
        name: "dut",
        ports: &PORTS,
        clock: "clk",
        timescale: Timescale::new(1, TimeUnit::Ns),
        trace_quantum: DEFAULT_TRACE_QUANTUM,
        kernel: KernelVTable {
            alloc: stub_alloc,
            eval: stub_op,
            finalize: stub_op,
            free: stub_op,
        },
        release: ReleasePolicy::Free,
    };

    fn opened_sink() -> VcdSink<Vec<u8>> {
        let mut sink = VcdSink::new(Vec::new(), &DESCRIPTOR);
        sink.open(&[0, 0, 0]).unwrap();
        sink
    }

    fn output(sink: &VcdSink<Vec<u8>>) -> String {
        String::from_utf8(sink.writer.clone()).unwrap()
    }

    #[test]
    fn header_contents() {
        let sink = opened_sink();
        let out = output(&sink);
        assert!(out.contains("$timescale"));
        assert!(out.contains("  1ns"));
        assert!(out.contains("$scope module dut $end"));
        assert!(out.contains("$var wire 1 ! clk $end"));
        assert!(out.contains("$var wire 4 \" bus $end"));
        assert!(out.contains("$var wire 40 # wide $end"));
        assert!(out.contains("$upscope $end"));
        assert!(out.contains("$enddefinitions $end"));
    }

    #[test]
    fn baseline_dumps_every_signal_at_time_zero() {
        let sink = opened_sink();
        let out = output(&sink);
        assert!(out.contains("#0"));
        assert!(out.contains("$dumpvars"));
        assert!(out.contains("0!"));
        assert!(out.contains("b0 \""));
        assert!(out.contains("b0 #"));
    }

    #[test]
    fn unchanged_sample_emits_nothing() {
        let mut sink = opened_sink();
        let before = sink.writer.len();
        sink.sample(0, &[0, 0, 0]).unwrap();
        assert_eq!(sink.writer.len(), before);
    }

    #[test]
    fn change_at_same_time_has_no_marker() {
        let mut sink = opened_sink();
        let before = sink.writer.len();
        sink.sample(0, &[1, 0, 0]).unwrap();
        let tail = String::from_utf8(sink.writer[before..].to_vec()).unwrap();
        assert_eq!(tail, "1!\n");
    }

    #[test]
    fn advancing_time_writes_marker() {
        let mut sink = opened_sink();
        sink.sample(50, &[1, 0, 0]).unwrap();
        let out = output(&sink);
        assert!(out.contains("#50"));
        assert!(out.ends_with("#50\n1!\n"));
    }

    #[test]
    fn marker_written_even_without_value_changes() {
        let mut sink = opened_sink();
        let before = sink.writer.len();
        sink.sample(50, &[0, 0, 0]).unwrap();
        let tail = String::from_utf8(sink.writer[before..].to_vec()).unwrap();
        assert_eq!(tail, "#50\n");
    }

    #[test]
    fn repeated_timestamp_not_reemitted() {
        let mut sink = opened_sink();
        sink.sample(50, &[1, 0, 0]).unwrap();
        let before = sink.writer.len();
        sink.sample(50, &[1, 5, 0]).unwrap();
        let tail = String::from_utf8(sink.writer[before..].to_vec()).unwrap();
        assert_eq!(tail, "b101 \"\n");
    }

    #[test]
    fn multibit_values_masked_to_width() {
        let mut sink = opened_sink();
        sink.sample(0, &[0, 0xFF, 0]).unwrap();
        let out = output(&sink);
        // Width 4: only the low nibble survives.
        assert!(out.contains("b1111 \""));
        assert!(!out.contains("b11111111 \""));
    }

    #[test]
    fn sixty_four_bit_values_unmasked() {
        assert_eq!(VcdSink::<Vec<u8>>::masked(u64::MAX, 64), u64::MAX);
        assert_eq!(VcdSink::<Vec<u8>>::masked(u64::MAX, 40), (1u64 << 40) - 1);
    }

    #[test]
    fn id_code_sequence() {
        assert_eq!(VcdSink::<Vec<u8>>::make_id_code(0), "!");
        assert_eq!(VcdSink::<Vec<u8>>::make_id_code(1), "\"");
        assert_eq!(VcdSink::<Vec<u8>>::make_id_code(93), "~");
        assert_eq!(VcdSink::<Vec<u8>>::make_id_code(94).len(), 2);
    }

    #[test]
    fn finish_flushes_without_trailer() {
        let mut sink = opened_sink();
        let before = sink.writer.len();
        sink.finish().unwrap();
        assert_eq!(sink.writer.len(), before);
    }
}
