use crate::{
    error::ExecutionError,
    memory::Memory,
    symbol::{decode, Opcode, Word, WORD_MAX, WORD_MIN},
};

/// Accumulator wraps around this many values.
const ACC_MODULUS: Word = WORD_MAX + 1;

/// Registers of the machine, all zero at the start of a run.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Registers {
    /// Accumulator
    pub acc: Word,
    /// Current instruction register
    pub cir: Word,
    /// Memory data register
    pub mdr: Word,
    /// Memory address register
    pub mar: usize,
    /// Program counter
    pub pc: usize,
}

/// Settings for a single run.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct RunConfig {
    /// Value read by every `IN` instruction.
    pub input: Word,
    pub start_pc: usize,
    /// Stop with an error after this many cycles. Unlimited by default.
    pub max_cycles: Option<u64>,
}

impl RunConfig {
    pub fn new(input: Word) -> Self {
        RunConfig {
            input,
            ..Default::default()
        }
    }

    pub fn start_pc(mut self, pc: usize) -> Self {
        self.start_pc = pc;
        self
    }

    pub fn max_cycles(mut self, limit: Option<u64>) -> Self {
        self.max_cycles = limit;
        self
    }
}

/// Result of one fetch-decode-execute cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Step {
    /// Address the instruction was fetched from.
    pub addr: usize,
    pub op: Opcode,
    pub operand: usize,
    pub effect: Effect,
}

/// What an instruction did, beyond updating registers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Effect {
    Halt,
    Read { addr: usize, val: Word },
    Write { addr: usize, val: Word },
    Branch { taken: bool },
    Input(Word),
    Output(Word),
}

/// Receives every executed cycle.
pub trait Trace {
    fn step(&mut self, machine: &Machine, step: &Step);
}

impl<F> Trace for F
where
    F: FnMut(&Machine, &Step),
{
    fn step(&mut self, machine: &Machine, step: &Step) {
        self(machine, step)
    }
}

/// Everything left over once a program halts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Execution {
    pub memory: Memory,
    pub registers: Registers,
    pub output: Vec<Word>,
    pub cycles: u64,
}

/// Complete machine state for one run of a program.
#[derive(Clone, Debug)]
pub struct Machine {
    mem: Memory,
    reg: Registers,
    /// Set by `SUB` underflow, cleared by `LDA`. Gates `BRP` on its own.
    neg_flag: bool,
    input: Word,
    output: Vec<Word>,
    cycles: u64,
    max_cycles: Option<u64>,
    halted: bool,
}

impl Machine {
    pub fn new(mem: Memory, config: RunConfig) -> Result<Machine, ExecutionError> {
        if !(WORD_MIN..=WORD_MAX).contains(&config.input) {
            return Err(ExecutionError::InputOutOfRange {
                input: config.input,
            });
        }
        Ok(Machine {
            mem,
            reg: Registers {
                pc: config.start_pc,
                ..Default::default()
            },
            neg_flag: false,
            input: config.input,
            output: Vec::new(),
            cycles: 0,
            max_cycles: config.max_cycles,
            halted: false,
        })
    }

    pub fn registers(&self) -> &Registers {
        &self.reg
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn neg_flag(&self) -> bool {
        self.neg_flag
    }

    pub fn output(&self) -> &[Word] {
        &self.output
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Run until `HLT`.
    pub fn run(self) -> Result<Execution, ExecutionError> {
        self.run_traced(|_: &Machine, _: &Step| {})
    }

    /// Run until `HLT`, reporting each cycle to `trace`.
    pub fn run_traced(mut self, mut trace: impl Trace) -> Result<Execution, ExecutionError> {
        while !self.halted {
            let step = self.step()?;
            trace.step(&self, &step);
        }
        Ok(self.finish())
    }

    fn finish(self) -> Execution {
        Execution {
            memory: self.mem,
            registers: self.reg,
            output: self.output,
            cycles: self.cycles,
        }
    }

    /// Perform a single fetch-decode-execute cycle.
    pub fn step(&mut self) -> Result<Step, ExecutionError> {
        if let Some(limit) = self.max_cycles {
            if self.cycles >= limit {
                return Err(ExecutionError::CycleLimit { limit });
            }
        }

        // Fetch
        let addr = self.reg.pc;
        self.reg.mar = addr;
        // PC incremented before instruction is performed
        self.reg.pc += 1;
        self.cycles += 1;
        self.reg.mdr = self.mem.read(self.reg.mar)?;
        self.reg.cir = self.reg.mdr;

        // Decode
        let (op, operand) = decode(self.reg.cir).ok_or(ExecutionError::InvalidOpcode {
            address: addr,
            word: self.reg.cir,
        })?;

        // Execute
        let effect = match op {
            Opcode::Hlt => {
                self.halted = true;
                Effect::Halt
            }
            Opcode::Add => {
                let val = self.read(operand)?;
                self.reg.acc = self
                    .reg
                    .acc
                    .checked_add(val)
                    .ok_or(ExecutionError::AccumulatorOverflow { address: addr })?;
                if self.reg.acc >= ACC_MODULUS {
                    self.reg.acc -= ACC_MODULUS;
                }
                Effect::Read { addr: operand, val }
            }
            Opcode::Sub => {
                let val = self.read(operand)?;
                self.reg.acc = self
                    .reg
                    .acc
                    .checked_sub(val)
                    .ok_or(ExecutionError::AccumulatorOverflow { address: addr })?;
                if self.reg.acc < 0 {
                    self.neg_flag = true;
                    self.reg.acc += ACC_MODULUS;
                }
                Effect::Read { addr: operand, val }
            }
            Opcode::Sto => {
                let val = self.reg.acc;
                self.write(operand, val)?;
                Effect::Write { addr: operand, val }
            }
            Opcode::Lda => {
                let val = self.read(operand)?;
                self.reg.acc = val;
                // Mailbox contents are taken to be non-negative
                self.neg_flag = false;
                Effect::Read { addr: operand, val }
            }
            Opcode::Br => self.branch(true, operand),
            Opcode::Brz => self.branch(self.reg.acc == 0, operand),
            Opcode::Brp => self.branch(self.reg.acc >= 0 && !self.neg_flag, operand),
            Opcode::In => {
                self.reg.acc = self.input;
                Effect::Input(self.input)
            }
            Opcode::Out => {
                self.output.push(self.reg.acc);
                Effect::Output(self.reg.acc)
            }
        };

        Ok(Step {
            addr,
            op,
            operand,
            effect,
        })
    }

    fn read(&mut self, addr: usize) -> Result<Word, ExecutionError> {
        self.reg.mar = addr;
        self.reg.mdr = self.mem.read(addr)?;
        Ok(self.reg.mdr)
    }

    fn write(&mut self, addr: usize, val: Word) -> Result<(), ExecutionError> {
        self.reg.mar = addr;
        self.reg.mdr = val;
        self.mem.write(addr, val)
    }

    fn branch(&mut self, cond: bool, target: usize) -> Effect {
        if cond {
            self.reg.pc = target;
        }
        Effect::Branch { taken: cond }
    }
}

/// Run `mem` from `start_pc` until it halts, with every `IN` reading `input`.
pub fn execute(mem: Memory, start_pc: usize, input: Word) -> Result<Execution, ExecutionError> {
    Machine::new(mem, RunConfig::new(input).start_pc(start_pc))?.run()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assemble;

    fn machine(src: &str, input: Word) -> Machine {
        let mem = assemble(src).unwrap().emit();
        Machine::new(mem, RunConfig::new(input)).unwrap()
    }

    fn run(src: &str, input: Word) -> Execution {
        machine(src, input).run().unwrap()
    }

    fn run_err(src: &str) -> ExecutionError {
        machine(src, 0).run().unwrap_err()
    }

    #[test]
    fn echo_input() {
        let exec = run("INP\nOUT\nHLT", 7);
        assert_eq!(exec.output, [7]);
        assert_eq!(exec.cycles, 3);
    }

    #[test]
    fn lone_halt() {
        let exec = run("HLT", 0);
        assert!(exec.output.is_empty());
        assert_eq!(exec.cycles, 1);
        assert_eq!(exec.registers.pc, 1);
    }

    #[test]
    fn countdown() {
        let src = "\
LOOP LDA COUNT
     BRZ END
     OUT
     SUB ONE
     STO COUNT
     BR LOOP
END  HLT
COUNT DAT 3
ONE  DAT 1";
        let exec = run(src, 0);
        assert_eq!(exec.output, [3, 2, 1]);
        assert_eq!(exec.memory.read(7), Ok(0));
        // 3 passes of 6 instructions, then LDA BRZ HLT
        assert_eq!(exec.cycles, 21);
    }

    #[test]
    fn add_wraps_without_flag() {
        let mut m = machine("LDA X\nADD Y\nOUT\nHLT\nX DAT 999\nY DAT 5", 0);
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.registers().acc, 4);
        assert!(!m.neg_flag());
        assert_eq!(m.run().unwrap().output, [4]);
    }

    #[test]
    fn sub_underflow_sets_flag() {
        let src = "\
     SUB ONE
     BRP SKIP
     OUT
     LDA ZERO
     BRP SKIP
     OUT
SKIP HLT
ONE  DAT 1
ZERO DAT 0";
        let mut m = machine(src, 0);
        let step = m.step().unwrap();
        assert_eq!(step.effect, Effect::Read { addr: 7, val: 1 });
        assert_eq!(m.registers().acc, 999);
        assert!(m.neg_flag());

        // acc >= 0, but the flag holds the branch back
        let step = m.step().unwrap();
        assert_eq!(step.effect, Effect::Branch { taken: false });
        assert_eq!(m.registers().pc, 2);

        m.step().unwrap();
        m.step().unwrap();
        assert!(!m.neg_flag());
        let step = m.step().unwrap();
        assert_eq!(step.effect, Effect::Branch { taken: true });

        let exec = m.run().unwrap();
        assert_eq!(exec.output, [999]);
    }

    #[test]
    fn flag_survives_other_instructions() {
        // Only LDA clears the flag
        let src = "SUB ONE\nADD ONE\nSTO T\nBRP END\nOUT\nEND HLT\nONE DAT 1\nT DAT 0";
        let exec = run(src, 0);
        assert_eq!(exec.output, [0]);
        assert_eq!(exec.memory.read(7), Ok(0));
    }

    #[test]
    fn every_in_reads_same_value() {
        let exec = run("IN\nOUT\nIN\nSTO X\nADD X\nOUT\nHLT\nX DAT 0", 12);
        assert_eq!(exec.output, [12, 24]);
    }

    #[test]
    fn brz_branches_on_zero() {
        let exec = run("IN\nBRZ Z\nOUT\nHLT\nZ LDA ONE\nOUT\nHLT\nONE DAT 1", 0);
        assert_eq!(exec.output, [1]);
        let exec = run("IN\nBRZ Z\nOUT\nHLT\nZ LDA ONE\nOUT\nHLT\nONE DAT 1", 5);
        assert_eq!(exec.output, [5]);
    }

    #[test]
    fn invalid_opcode_is_fatal() {
        let err = machine("LDA X\nX DAT -5", 0).run().unwrap_err();
        assert_eq!(err, ExecutionError::InvalidOpcode { address: 1, word: -5 });
    }

    #[test]
    fn running_off_the_end() {
        let mut mem = Memory::new();
        // OUT in every mailbox, no HLT
        for addr in 0..crate::RAM_SIZE {
            mem.write(addr, Opcode::Out.encode(0)).unwrap();
        }
        let err = execute(mem, 0, 0).unwrap_err();
        assert_eq!(err, ExecutionError::AddressOutOfBounds { address: 100 });
    }

    #[test]
    fn start_pc() {
        let mem = assemble("OUT\nIN\nOUT\nHLT").unwrap().emit();
        let exec = execute(mem, 1, 3).unwrap();
        assert_eq!(exec.output, [3]);
        assert_eq!(exec.cycles, 3);

        let mem = assemble("HLT").unwrap().emit();
        assert_eq!(
            execute(mem, 100, 0),
            Err(ExecutionError::AddressOutOfBounds { address: 100 })
        );
    }

    #[test]
    fn cycle_limit() {
        let mem = assemble("LOOP BR LOOP").unwrap().emit();
        let config = RunConfig::new(0).max_cycles(Some(50));
        let err = Machine::new(mem, config).unwrap().run().unwrap_err();
        assert_eq!(err, ExecutionError::CycleLimit { limit: 50 });
    }

    #[test]
    fn negative_cells_grow_accumulator() {
        // Subtracting a negative never underflows, so acc climbs until it leaves i32
        let src = "L SUB NEG\nBR L\nNEG DAT -999";
        let mem = assemble(src).unwrap().emit();
        let config = RunConfig::new(0).max_cycles(Some(1000));
        let err = Machine::new(mem.clone(), config).unwrap().run().unwrap_err();
        assert_eq!(err, ExecutionError::CycleLimit { limit: 1000 });

        let config = RunConfig::new(0).max_cycles(Some(6_000_000));
        let err = Machine::new(mem, config).unwrap().run().unwrap_err();
        assert_eq!(err, ExecutionError::AccumulatorOverflow { address: 0 });

        let err = run_err("L ADD NEG\nBR L\nNEG DAT -999");
        assert_eq!(err, ExecutionError::AccumulatorOverflow { address: 0 });
    }

    #[test]
    fn stepping_by_hand() {
        let mut m = machine("IN\nOUT\nHLT", 9);
        assert!(!m.is_halted());
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.output(), [9]);
        assert_eq!(m.cycles(), 2);
        assert!(!m.is_halted());
        let step = m.step().unwrap();
        assert_eq!(step.effect, Effect::Halt);
        assert!(m.is_halted());
        assert_eq!(m.memory().read(0), Ok(800));
    }

    #[test]
    fn input_out_of_range() {
        let err = Machine::new(Memory::new(), RunConfig::new(1000)).unwrap_err();
        assert_eq!(err, ExecutionError::InputOutOfRange { input: 1000 });
    }

    #[test]
    fn runs_do_not_share_state() {
        let src = "SUB ONE\nBRP END\nOUT\nEND HLT\nONE DAT 1";
        let program = assemble(src).unwrap();
        for _ in 0..3 {
            let exec = execute(program.emit(), 0, 0).unwrap();
            assert_eq!(exec.output, [999]);
            assert_eq!(exec.cycles, 4);
        }
    }

    #[test]
    fn trace_sees_every_cycle() {
        let mut seen = Vec::new();
        machine("IN\nOUT\nHLT", 4)
            .run_traced(|m: &Machine, step: &Step| seen.push((step.op, m.registers().acc)))
            .unwrap();
        assert_eq!(
            seen,
            [(Opcode::In, 4), (Opcode::Out, 4), (Opcode::Hlt, 4)]
        );
    }
}
