mod sim;

use std::thread;
use std::time::Duration;

use sim::{Interrupts, Knobs, Op, Reg, Sim};
use stm32f103_periph::adc::{self, Accumulator, BLOCK};
use stm32f103_periph::ral::adc::{CR1, CR2};
use stm32f103_periph::ral::dma::CCR;
use stm32f103_periph::{Dma, Interrupt};

type Adc<'cb, 'a> = adc::Adc<'cb, &'a Sim, &'a Sim>;

#[test]
fn init_powers_on_and_calibrates() {
    let sim = Sim::new();
    let interrupts = Interrupts::default();
    let adc = Adc::new(&sim);
    adc.init(&interrupts);

    assert_eq!(interrupts.enabled(), [Interrupt::ADC1_2]);
    let state = sim.state();
    assert_ne!(state.adc.cr1 & CR1::EOCIE, 0);
    assert_eq!(state.adc.cr2 & CR2::EXTSEL_SWSTART, CR2::EXTSEL_SWSTART);
    assert_ne!(state.adc.cr2 & CR2::EXTTRIG, 0);
    assert_ne!(state.adc.cr2 & CR2::ADON, 0);
    assert_eq!(state.adc.cr2 & (CR2::RSTCAL | CR2::CAL), 0);
    assert_eq!((state.adc.sqr1, state.adc.sqr2, state.adc.sqr3), (0, 0, 0));
}

#[test]
fn calibration_gives_up_quietly() {
    let sim = Sim::with_knobs(Knobs {
        stuck_calibration: true,
        ..Knobs::default()
    });
    let adc = Adc::new(&sim);
    adc.init(&Interrupts::default());
    assert!(!adc.calibrate());

    let cr2_reads = sim
        .log()
        .iter()
        .filter(|e| matches!(e.op, Op::Read(Reg::Adc(adc::Register::Cr2), _)))
        .count();
    // Two calibrations, two bounded steps each, plus the read-modify-writes.
    assert!(cr2_reads <= 4 * 1000 + 16, "{cr2_reads} CR2 reads");
    assert_ne!(adc.cr2() & CR2::ADON, 0);
}

#[test]
fn single_conversion() {
    let sim = Sim::new();
    sim.state().adc.conversions.extend([1234, 99]);
    let adc = Adc::new(&sim);
    adc.init(&Interrupts::default());

    assert_eq!(adc.try_data(), None);
    adc.start_conversion();
    adc.on_interrupt();
    assert_eq!(adc.data(), 1234);
    assert_eq!(adc.try_data(), None);

    adc.start_conversion();
    adc.on_interrupt();
    assert_eq!(adc.try_data(), Some(99));
}

#[test]
fn data_waits_for_the_interrupt() {
    let sim = Sim::new();
    sim.state().adc.conversions.push_back(0x0ABC);
    let adc = Adc::new(&sim);
    adc.init(&Interrupts::default());

    thread::scope(|s| {
        let reader = s.spawn(|| adc.data());
        thread::sleep(Duration::from_millis(20));
        adc.start_conversion();
        adc.on_interrupt();
        assert_eq!(reader.join().unwrap(), 0x0ABC);
    });
}

#[test]
fn attach_configures_continuous_scan() {
    let sim = Sim::new();
    let accumulator = Accumulator::new();
    let dma = Dma::new(&sim);
    let mut adc = Adc::new(&sim);
    adc.init(&Interrupts::default());
    assert!(adc.attach(&dma, &accumulator));

    let state = sim.state();
    assert_ne!(state.adc.cr1 & CR1::SCAN, 0);
    assert_ne!(state.adc.cr2 & CR2::CONT, 0);
    assert_ne!(state.adc.cr2 & CR2::DMA, 0);
    assert_eq!(state.adc.smpr2, 0o7777);
    assert_eq!(state.adc.sqr1, 3 << 20);
    assert_eq!(state.adc.sqr2, 0);
    assert_eq!(state.adc.sqr3, (1 << 5) | (2 << 10) | (3 << 15));

    let ch = state.dma.ch[0];
    assert_eq!(ch.cpar, 0x4001_244C);
    assert_eq!(ch.cndtr, 4);
    assert_ne!(ch.ccr & CCR::EN, 0);
    assert_ne!(ch.ccr & CCR::CIRC, 0);
    assert_ne!(ch.ccr & CCR::MINC, 0);
    assert_eq!(ch.ccr & CCR::DIR, 0);
    assert_eq!((ch.ccr >> CCR::MSIZE_OFFSET) & CCR::SIZE_MASK, 0b01);
}

#[test]
fn scans_average_in_blocks() {
    let sim = Sim::new();
    let accumulator = Accumulator::new();
    let dma = Dma::new(&sim);
    let mut adc = Adc::new(&sim);
    adc.init(&Interrupts::default());
    assert!(adc.attach(&dma, &accumulator));
    adc.start_conversion();

    for i in 0..BLOCK {
        let low = if i % 2 == 0 { 100 } else { 200 };
        sim.adc_scan([low, 1000, 2000, 4095]);
        assert!(adc.on_dma_interrupt().is_complete());
        if i < BLOCK - 1 {
            assert_eq!(accumulator.blocks(), 0, "scan {i}");
        }
    }
    assert_eq!(accumulator.samples(), [200, 1000, 2000, 4095]);
    assert_eq!(accumulator.blocks(), 1);
    assert_eq!(accumulator.means(), [150, 1000, 2000, 4095]);

    // Scan 4097 starts a fresh block.
    sim.adc_scan([1, 2, 3, 4]);
    adc.on_dma_interrupt();
    assert_eq!(accumulator.sums(), [1, 2, 3, 4]);
    assert_eq!(accumulator.sample_count(), BLOCK + 1);
}

#[test]
fn enable_pauses_and_resumes_the_stream() {
    let sim = Sim::new();
    let accumulator = Accumulator::new();
    let dma = Dma::new(&sim);
    let mut adc = Adc::new(&sim);
    assert!(adc.attach(&dma, &accumulator));

    adc.enable(false);
    assert!(!adc.channel().unwrap().is_enabled());
    sim.adc_scan([1, 1, 1, 1]);
    assert!(adc.on_dma_interrupt().is_empty());
    assert_eq!(accumulator.sample_count(), 0);

    adc.enable(true);
    assert!(adc.channel().unwrap().is_enabled());
    sim.adc_scan([1, 1, 1, 1]);
    adc.on_dma_interrupt();
    assert_eq!(accumulator.sample_count(), 1);
}

#[test]
fn second_attach_fails() {
    let sim = Sim::new();
    let accumulator = Accumulator::new();
    let dma = Dma::new(&sim);
    let mut first = Adc::new(&sim);
    let mut second = Adc::new(&sim);
    assert!(first.attach(&dma, &accumulator));
    assert!(!second.attach(&dma, &accumulator));
    assert!(second.channel().is_none());
}
