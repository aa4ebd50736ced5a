//! Interactive hardware tester (`roverd hwtest`).
//!
//! Drives single servos and the motors directly, bypassing kinematics and the
//! watchdog, to check wiring on the bench.  Commands:
//!
//!   servo <0-3> <angle>  – move one servo (0 = front-left … 3 = rear-right)
//!   motor <speed>        – run both sides at -100..100
//!   stop                 – motors off, servos detached
//!   help                 – show this list
//!   quit | exit          – stop everything and leave

use colored::Colorize;
use rover_hal::servo::{MAX_ANGLE, MIN_ANGLE, angle_to_duty};
use rover_hal::{Actuation, RoverDriver};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

/// One parsed tester command.
#[derive(Debug, Clone, PartialEq)]
pub enum TestCommand {
    Servo { index: usize, angle: f32 },
    Motor { speed: i32 },
    Stop,
    Help,
    Quit,
}

/// Parse one input line.  Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<TestCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let cmd = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("servo", [index, angle]) => {
            let index = index
                .parse::<usize>()
                .ok()
                .filter(|i| *i < 4)
                .ok_or_else(|| format!("servo index must be 0-3, got '{index}'"))?;
            let angle = angle
                .parse::<f32>()
                .ok()
                .filter(|a| a.is_finite())
                .ok_or_else(|| format!("angle must be a number, got '{angle}'"))?;
            TestCommand::Servo { index, angle }
        }
        ("servo", _) => return Err("usage: servo <0-3> <angle>".to_string()),
        ("motor", [speed]) => {
            let speed = speed
                .parse::<i32>()
                .map_err(|_| format!("speed must be an integer, got '{speed}'"))?;
            TestCommand::Motor { speed }
        }
        ("motor", _) => return Err("usage: motor <-100..100>".to_string()),
        ("stop", []) => TestCommand::Stop,
        ("help", _) => TestCommand::Help,
        ("quit" | "exit" | "q", _) => TestCommand::Quit,
        (other, _) => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(cmd))
}

/// Run the tester prompt against `driver` until the user quits or closes
/// stdin.  The driver is always stopped on the way out.
pub fn run(driver: &mut RoverDriver) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Cannot open prompt".red(), e);
            return;
        }
    };
    print_help();

    loop {
        let line = match editor.readline("hwtest> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        let _ = editor.add_history_entry(line.as_str());

        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(TestCommand::Quit)) => break,
            Ok(Some(cmd)) => execute(driver, cmd),
            Err(msg) => println!("{} {}", "✗".red(), msg),
        }
    }

    driver.stop();
    println!("{}", "  ✓ Motors stopped, servos detached.".green());
}

fn execute(driver: &mut RoverDriver, cmd: TestCommand) {
    match cmd {
        TestCommand::Servo { index, angle } => {
            let Some(servo) = driver.servo_mut(index) else {
                return;
            };
            if servo.is_inert() {
                println!("{} servo {index} (gpio{}) failed to initialise", "✗".red(), servo.pin());
                return;
            }
            let clamped = angle.clamp(MIN_ANGLE, MAX_ANGLE);
            match servo.set_angle(angle) {
                Ok(true) => println!(
                    "  Angle {clamped:.1} -> Duty {:.1} %",
                    angle_to_duty(clamped)
                ),
                Ok(false) => println!("  {}", "Within 1° of current angle; unchanged.".dimmed()),
                Err(e) => {
                    warn!(index, error = %e, "servo write failed");
                    println!("{} {}", "✗".red(), e);
                }
            }
        }
        TestCommand::Motor { speed } => {
            let motors = driver.motors_mut();
            let applied = speed.clamp(-motors.max_speed(), motors.max_speed());
            match motors.set_speed(applied, applied) {
                Ok(()) => println!(
                    "  Speed {applied} ({})",
                    if applied >= 0 { "forward" } else { "reverse" }
                ),
                Err(e) => println!("{} {}", "✗".red(), e),
            }
        }
        TestCommand::Stop => {
            driver.stop();
            println!("  Stopped.");
        }
        TestCommand::Help => print_help(),
        TestCommand::Quit => {}
    }
}

fn print_help() {
    println!();
    println!("{}", "Hardware Tester".bold().underline());
    println!("  {}  – move servo 0-3 (FL, FR, RL, RR)", "servo <i> <angle>".bold().cyan());
    println!("  {}      – run both motor sides, -100..100", "motor <speed>".bold().cyan());
    println!("  {}               – stop motors, detach servos", "stop".bold().cyan());
    println!("  {}        – leave the tester", "quit  exit".bold().cyan());
    println!();
}
