use hdf4_test_utils::fixtures;
use predicates::prelude::*;
use serde_json::Value;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct SampleFile {
    _dir: TempDir,
    path: PathBuf,
}

fn write_sample(bytes: Vec<u8>) -> Result<SampleFile, Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sample.hdf");
    fs::write(&path, bytes)?;
    Ok(SampleFile { _dir: dir, path })
}

fn h4() -> Result<assert_cmd::Command, Box<dyn Error>> {
    Ok(assert_cmd::Command::cargo_bin("h4")?)
}

fn stdout_of(args: &[&str]) -> Result<String, Box<dyn Error>> {
    let output = h4()?.args(args).assert().success().get_output().stdout.clone();
    Ok(String::from_utf8(output)?)
}

#[test]
fn ls_table_lists_groups_and_variables() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::sd_interface_file())?;
    let stdout = stdout_of(&["ls", sample.path.to_str().unwrap()])?;
    assert!(stdout.contains("/Geophysical"));
    assert!(stdout.contains("temperature\tfloat32\t[3, 4]\tlat, lon"));
    assert!(stdout.contains("dim lat = 3"));
    assert!(stdout.contains("CoreMetadata.0"));
    Ok(())
}

#[test]
fn ls_attributes_show_values() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::sds_file())?;
    let stdout = stdout_of(&["ls", sample.path.to_str().unwrap(), "--attributes"])?;
    assert!(stdout.contains(":long_name = \"Temperature\""));
    assert!(stdout.contains(":valid_max = 5.5"));
    assert!(stdout.contains(":HDF4_Version"));
    Ok(())
}

#[test]
fn ls_json_output_parses() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::vdata_file())?;
    let stdout = stdout_of(&["ls", sample.path.to_str().unwrap(), "--format", "json"])?;
    let value: Value = serde_json::from_str(&stdout)?;
    let variables = value["variables"].as_array().unwrap();
    let paths: Vec<&str> = variables
        .iter()
        .map(|v| v["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["/stations", "/counts"]);
    assert_eq!(variables[0]["members"].as_array().unwrap().len(), 3);
    Ok(())
}

#[test]
fn ls_reports_diagnostics() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::image_file())?;
    h4()?
        .args(["ls", sample.path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("warning:"));
    Ok(())
}

#[test]
fn tags_lists_directory() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::sds_file())?;
    let stdout = stdout_of(&["tags", sample.path.to_str().unwrap()])?;
    assert!(stdout.starts_with("Code\tName\tRef"));
    assert!(stdout.contains("720\t"));
    assert!(stdout.contains("/SDS-2"));
    Ok(())
}

#[test]
fn tags_orphans_only() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::image_file())?;
    let stdout = stdout_of(&[
        "tags",
        sample.path.to_str().unwrap(),
        "--orphans",
        "--format",
        "json",
    ])?;
    let value: Value = serde_json::from_str(&stdout)?;
    let tags = value.as_array().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0]["code"], 104);
    assert!(tags[0]["owner"].is_null());
    Ok(())
}

#[test]
fn layout_of_chunked_variable() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::chunked_file())?;
    let stdout = stdout_of(&["layout", sample.path.to_str().unwrap(), "SDS-4"])?;
    assert!(stdout.contains("kind\tchunked"));
    assert!(stdout.contains("chunks\t4"));
    assert!(stdout.contains("deflate"));

    let stdout = stdout_of(&[
        "layout",
        sample.path.to_str().unwrap(),
        "SDS-4",
        "--format",
        "json",
    ])?;
    let value: Value = serde_json::from_str(&stdout)?;
    assert_eq!(value["layout"]["kind"]["kind"], "chunked");
    Ok(())
}

#[test]
fn cat_section_prints_values() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::chunked_file())?;
    let stdout = stdout_of(&[
        "cat",
        sample.path.to_str().unwrap(),
        "SDS-4",
        "--section",
        "1,2:3",
    ])?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["12", "13"]);
    Ok(())
}

#[test]
fn cat_member_as_json() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::vdata_file())?;
    let stdout = stdout_of(&[
        "cat",
        sample.path.to_str().unwrap(),
        "stations",
        "--member",
        "name",
        "--format",
        "json",
    ])?;
    let value: Value = serde_json::from_str(&stdout)?;
    assert_eq!(value["data"]["type"], "strings");
    assert_eq!(value["data"]["values"][2], "charlie");
    Ok(())
}

#[test]
fn cat_with_progress_writes_to_stderr_only() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::vdata_file())?;
    h4()?
        .args(["cat", sample.path.to_str().unwrap(), "counts", "--progress"])
        .assert()
        .success()
        .stdout("1\n2\n3\n5\n8\n");
    Ok(())
}

#[test]
fn cat_unknown_variable_lists_available() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::vdata_file())?;
    h4()?
        .args(["cat", sample.path.to_str().unwrap(), "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Available variables: /counts, /stations"));
    Ok(())
}

#[test]
fn cat_bad_section_fails() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::sds_file())?;
    h4()?
        .args(["cat", sample.path.to_str().unwrap(), "SDS-2", "--section", "0:9,0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of bounds"));
    Ok(())
}

#[test]
fn not_hdf4_fails() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(b"plain text, not HDF".to_vec())?;
    h4()?
        .args(["ls", sample.path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot open"));
    Ok(())
}

#[test]
fn strict_flag_is_accepted() -> Result<(), Box<dyn Error>> {
    let sample = write_sample(fixtures::sds_file())?;
    h4()?
        .args(["--strict", "ls", sample.path.to_str().unwrap()])
        .assert()
        .success();
    Ok(())
}
