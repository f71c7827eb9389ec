use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("replay").arg("tests/fixtures/replay.csv");

    // ada: 2 x 1350 earned, 1000 paid out. grace: 899.1 earned, 100 pending.
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "teacher,balance,pending,earnings,withdrawn",
        ))
        .stdout(predicate::str::contains("ada,1700,0,2700,1000"))
        .stdout(predicate::str::contains("grace,799.1,100,899.1,0"));

    Ok(())
}

#[test]
fn test_statement_sorted_by_teacher_name() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op,user,target,lesson,amount").unwrap();
    writeln!(file, "admin,root,,,").unwrap();
    writeln!(file, "student,kemi,,,").unwrap();
    for (teacher, course) in [("zara", "z1"), ("bode", "b1")] {
        writeln!(file, "teacher,{teacher},,,").unwrap();
        writeln!(file, "approve_teacher,root,{teacher},,").unwrap();
        writeln!(file, "course,{teacher},{course},,").unwrap();
        writeln!(file, "lesson,{teacher},{course},l1,100").unwrap();
        writeln!(file, "purchase,kemi,{course},l1,").unwrap();
    }

    let output = Command::new(cargo_bin!("lessonpay"))
        .arg("replay")
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "teacher,balance,pending,earnings,withdrawn",
            "bode,90,0,90,0",
            "zara,90,0,90,0",
        ]
    );
}

#[test]
fn test_bad_rows_are_skipped() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op,user,target,lesson,amount").unwrap();
    writeln!(file, "admin,root,,,").unwrap();
    writeln!(file, "teacher,ada,,,").unwrap();
    writeln!(file, "refund,ada,,,").unwrap(); // unknown op
    writeln!(file, "approve_teacher,root,ada,,").unwrap();
    writeln!(file, "course,ada,math101,,").unwrap();
    writeln!(file, "lesson,ada,math101,vectors,not_a_number").unwrap();
    writeln!(file, "lesson,ada,math101,vectors,1500").unwrap();
    writeln!(file, "student,bola,,,").unwrap();
    writeln!(file, "purchase,bola,math101,vectors,").unwrap();
    writeln!(file, "purchase,nobody,math101,vectors,").unwrap(); // unknown student
    writeln!(file, "withdraw,ada,,,5000").unwrap(); // insufficient funds

    let mut cmd = Command::new(cargo_bin!("lessonpay"));
    cmd.arg("replay").arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Skipping event"))
        .stdout(predicate::str::contains("ada,1350,0,1350,0"));
}

#[test]
fn test_missing_input_fails() {
    let mut cmd = Command::new(cargo_bin!("lessonpay"));
    cmd.arg("replay").arg("tests/fixtures/does_not_exist.csv");
    cmd.assert().failure();
}
