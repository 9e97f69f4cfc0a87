use assert_cmd::Command;

pub fn rescuebot_bin() -> Command {
    #[allow(deprecated)]
    {
        Command::cargo_bin("rescuebot").expect("rescuebot test binary should build")
    }
}
