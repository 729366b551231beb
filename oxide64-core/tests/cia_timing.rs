// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use oxide64_core::factory::{Chip, CiaModel};
use oxide64_core::io::cia::{reg, Mode};
use oxide64_core::io::Cia;
use oxide64_core::util::{new_shared, IoPort, IrqLine, Pin};

fn setup_cia() -> Cia {
    let cia_flag = new_shared(Pin::new_low());
    let cia_port_a = new_shared(IoPort::new(0x00, 0xff));
    let cia_port_b = new_shared(IoPort::new(0x00, 0xff));
    let cpu_irq = new_shared(IrqLine::new("irq"));
    let keyboard_matrix = new_shared([0xff; 16]);
    let mut cia = Cia::new(
        CiaModel::Mos6526,
        Mode::Cia1,
        None,
        None,
        Some(keyboard_matrix),
        cia_port_a,
        cia_port_b,
        cia_flag,
        cpu_irq,
    );
    cia.reset();
    cia
}

#[test]
fn timer_b_stop_keeps_counter() {
    let mut cia = setup_cia();
    cia.write(reg::TBLO, 0x09);
    cia.write(reg::TBHI, 0x00);
    cia.clock();
    cia.clock();
    // STA $dd0f #1 - 4 cycles
    for _i in 0..3 {
        cia.clock();
    }
    cia.write(reg::CRB, 0x00);
    cia.clock();
    // STA $dd0f #2 - 4 cycles
    for _i in 0..3 {
        cia.clock();
    }
    cia.write(reg::CRB, 0x01);
    cia.clock();
    // counting starts after the two cycle pipeline delay
    assert_eq!(0x09, cia.read(reg::TBLO));
    cia.clock();
    assert_eq!(0x09, cia.read(reg::TBLO));
    cia.clock();
    assert_eq!(0x08, cia.read(reg::TBLO));
    cia.clock();
    assert_eq!(0x07, cia.read(reg::TBLO));
    cia.clock();
}

#[test]
fn timer_b_force_load_takes_two_cycles() {
    let mut cia = setup_cia();
    cia.write(reg::TBLO, 0x09);
    cia.write(reg::TBHI, 0x00);
    cia.clock();
    cia.clock();
    cia.write(reg::TBLO, 0x0a);
    // STA $dd0f #1 - 4 cycles
    for _i in 0..3 {
        cia.clock();
    }
    cia.write(reg::CRB, 0x00);
    cia.clock();
    // STA $dd0f #2 - 4 cycles
    for _i in 0..3 {
        cia.clock();
    }
    cia.write(reg::CRB, 0x10);
    cia.clock();
    assert_eq!(0x09, cia.read(reg::TBLO));
    cia.clock();
    assert_eq!(0x0a, cia.read(reg::TBLO));
    cia.clock();
    assert_eq!(0x0a, cia.read(reg::TBLO));
    cia.clock();
    assert_eq!(0x0a, cia.read(reg::TBLO));
    cia.clock();
}

/*
Program CIA1TAB - timer A with PB6 in pulse mode, IMR = $02.

Both latches are set to 2. TA counts system clocks; at every underflow the
counter shows the reloaded latch, the reload pauses the count chain for one
cycle and PB6 pulses high.

TA  01 02 02 01 02 02
PB  80 C0 80 80 C0 80
ICR 00 01 01 01 01 01
*/
#[test]
fn timer_a_underflow_cadence() {
    let mut cia = setup_cia();
    cia.write(reg::DDRB, 0x7f);
    cia.write(reg::ICR, 0x82);
    cia.write(reg::CRA, 0x00);
    cia.write(reg::CRB, 0x00);
    cia.write(reg::TALO, 0x02);
    cia.write(reg::TAHI, 0x00);
    cia.write(reg::TBLO, 0x02);
    cia.write(reg::TBHI, 0x00);
    cia.clock();
    cia.clock();
    cia.write(reg::CRA, 0x03);
    cia.clock(); // Count0|Count1
    cia.clock(); // Count2
    cia.clock(); // Count3
    assert_eq!(0x01, cia.read(reg::TALO));
    assert_eq!(0x80, cia.read(reg::PRB));
    cia.clock(); // Count3|Underflow|Load1
    assert_eq!(0x02, cia.read(reg::TALO));
    assert_eq!(0xc0, cia.read(reg::PRB));
    cia.clock(); // Count2
    assert_eq!(0x02, cia.read(reg::TALO));
    assert_eq!(0x80, cia.read(reg::PRB));
    cia.clock(); // Count3
    assert_eq!(0x01, cia.read(reg::TALO));
    assert_eq!(0x80, cia.read(reg::PRB));
    cia.clock(); // Count3|Underflow|Load1
    assert_eq!(0x02, cia.read(reg::TALO));
    assert_eq!(0xc0, cia.read(reg::PRB));
    cia.clock(); // Count2
    assert_eq!(0x02, cia.read(reg::TALO));
    assert_eq!(0x80, cia.read(reg::PRB));
}

#[test]
fn irq_line_asserted_one_cycle_after_underflow() {
    let irq_line = new_shared(IrqLine::new("irq"));
    let mut cia2 = Cia::new(
        CiaModel::Mos6526,
        Mode::Cia2,
        None,
        None,
        None,
        new_shared(IoPort::new(0x00, 0xff)),
        new_shared(IoPort::new(0x00, 0xff)),
        new_shared(Pin::new_low()),
        irq_line.clone(),
    );
    cia2.reset();
    cia2.write(reg::TALO, 0x02);
    cia2.write(reg::TAHI, 0x00);
    cia2.clock();
    cia2.clock();
    cia2.write(reg::ICR, 0x81);
    cia2.write(reg::CRA, 0x01);
    // the line stays high through the underflow cycle itself
    for _ in 0..4 {
        cia2.clock();
        assert_eq!(false, irq_line.borrow().is_low());
    }
    cia2.clock(); // one cycle later the line goes low
    assert_eq!(true, irq_line.borrow().is_low());
}
