use std::{ops::Deref, rc::Rc, time::Instant};

use shrc::Shrc;

fn test_clone_shrc(n: f64) -> f64 {
    let shrc = Shrc::new(100);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        std::hint::black_box(shrc.clone());
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_clone_rc(n: f64) -> f64 {
    let rc = Rc::new(100);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        std::hint::black_box(rc.clone());
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_deref_shrc(n: f64) -> f64 {
    let shrc = Shrc::new(100);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        std::hint::black_box(shrc.deref());
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_deref_rc(n: f64) -> f64 {
    let rc = Rc::new(100);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        std::hint::black_box(rc.deref());
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_new_shrc(n: f64) -> f64 {
    let start = Instant::now();
    for i in 0..(n as u64) {
        std::hint::black_box(Shrc::new(i));
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_try_new_shrc(n: f64) -> Result<f64, shrc::Error> {
    let start = Instant::now();
    for i in 0..(n as u64) {
        std::hint::black_box(Shrc::try_new(i)?);
    }
    let end = Instant::now();
    Ok((end - start).as_nanos() as f64 / n)
}

fn test_try_from_box_shrc(n: f64) -> Result<f64, shrc::Error> {
    let start = Instant::now();
    for i in 0..(n as u64) {
        let boxed = Box::new(i);
        std::hint::black_box(Shrc::try_from_box(boxed)?);
    }
    let end = Instant::now();
    Ok((end - start).as_nanos() as f64 / n)
}

fn test_clone_from_shrc(n: f64) -> f64 {
    let a = Shrc::new(100);
    let b = Shrc::new(200);
    let mut target = a.clone();

    let start = Instant::now();
    for i in 0..(n as u64) {
        target.clone_from(if i % 2 == 0 { &b } else { &a });
        std::hint::black_box(&target);
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn test_unshare_shrc(n: f64) -> Result<f64, shrc::Error> {
    let shrc = Shrc::new(100);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        let mut copy = shrc.clone();
        std::hint::black_box(Shrc::unshare(&mut copy)?);
    }
    let end = Instant::now();
    Ok((end - start).as_nanos() as f64 / n)
}

fn test_make_mut_rc(n: f64) -> f64 {
    let rc = Rc::new(100);

    let start = Instant::now();
    for _ in 0..(n as u64) {
        let mut copy = rc.clone();
        std::hint::black_box(Rc::make_mut(&mut copy));
    }
    let end = Instant::now();
    (end - start).as_nanos() as f64 / n
}

fn main() -> Result<(), shrc::Error> {
    let n = 10e6;

    println!("Clone test Shrc ({}x): {}ns avg", n, test_clone_shrc(n));
    println!("Clone test Rc ({}x): {}ns avg", n, test_clone_rc(n));

    println!("Deref test Shrc ({}x): {}ns avg", n, test_deref_shrc(n));
    println!("Deref test Rc ({}x): {}ns avg", n, test_deref_rc(n));

    println!("New test Shrc ({}x): {}ns avg", n, test_new_shrc(n));
    println!("Try new test Shrc ({}x): {}ns avg", n, test_try_new_shrc(n)?);
    println!(
        "Try from box test Shrc ({}x): {}ns avg",
        n,
        test_try_from_box_shrc(n)?
    );
    println!("Clone from test Shrc ({}x): {}ns avg", n, test_clone_from_shrc(n));

    println!("Unshare test Shrc ({}x): {}ns avg", n, test_unshare_shrc(n)?);
    println!("Make mut test Rc ({}x): {}ns avg", n, test_make_mut_rc(n));
    Ok(())
}
