use colored::*;
use tracing::info;

use crate::terminal::colors;
use crate::terminal::logging::PRINT_TARGET;

pub const TOTAL_WIDTH: usize = 64;
const TREE_KEY_WIDTH: usize = 9;

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

pub fn blank() {
    print("");
}

pub fn banner(quiet: bool) {
    if quiet {
        return;
    }

    let text_content: String = format!("⟦ NETSCAN v{} ⟧ ", env!("CARGO_PKG_VERSION"));
    let text_width: usize = console::measure_text_width(&text_content);
    let text: ColoredString = text_content.bright_green().bold();
    let sep: ColoredString = "═".repeat(TOTAL_WIDTH.saturating_sub(text_width) / 2).bright_black();
    print(&format!("{sep}{text}{sep}"));
}

pub fn header(msg: &str, quiet: bool) {
    if quiet {
        return;
    }

    let formatted: String = format!("⟦ {} ⟧", msg);
    let msg_len: usize = formatted.chars().count();

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_len);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: ColoredString = format!(
        "{}{}{}",
        "─".repeat(left),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right)
    )
    .bright_black();

    print(&format!("{}", line));
}

/// `[1/3] host discovery`
pub fn phase(step: usize, total: usize, name: &str) {
    let counter: String = format!("[{}/{}]", step.to_string().color(colors::ACCENT), total);
    print(&format!("{} {}", counter.color(colors::SEPARATOR), name.color(colors::PRIMARY).bold()));
}

pub fn fat_separator() {
    let sep: ColoredString = "═".repeat(TOTAL_WIDTH).bright_black();
    print(&format!("{}", sep));
}

pub fn print_status<T: AsRef<str>>(msg: T) {
    let prefix: ColoredString = ">".color(colors::SEPARATOR);
    let message: String = format!("{} {}", prefix, msg.as_ref().color(colors::TEXT_DEFAULT));
    print(&message);
}

pub fn tree_head(idx: usize, name: &str) {
    let idx_str: String = format!("[{}]", idx.to_string().color(colors::ACCENT));
    let output: String = format!("{} {}", idx_str.color(colors::SEPARATOR), name.color(colors::PRIMARY));
    print(&output);
}

pub fn as_tree_one_level(key_value_pair: Vec<(String, ColoredString)>) {
    for (i, (key, value)) in key_value_pair.iter().enumerate() {
        let last: bool = i + 1 == key_value_pair.len();
        let branch: ColoredString = if !last { "├─".bright_black() } else { "└─".bright_black() };
        let dots: String = ".".repeat(TREE_KEY_WIDTH.saturating_sub(key.len()));
        let output: String = format!(
            " {} {}{}{} {}",
            branch,
            key.color(colors::TEXT_DEFAULT),
            dots.color(colors::SEPARATOR),
            ":".color(colors::SEPARATOR),
            value
        );
        print(&output);
    }
}

pub fn centerln(msg: &str) {
    let space = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2);
    print(&format!("{}{}{}", space, msg, space));
}

const NO_RESULTS_0: &str = r#"
                       _  _    ___  _  _                 
                      | || |  / _ \| || |                
                      | || |_| | | | || |_               
                      |__   _| |_| |__   _|              
         _   _  ___ _____|_|__\___/__ |_|  _ _   _ ____  
        | \ | |/ _ \_   _| |  ___/ _ \| | | | \ | |  _ \ 
        |  \| | | | || |   | |_ | | | | | | |  \| | | | |
        | |\  | |_| || |   |  _|| |_| | |_| | |\  | |_| |
        |_| \_|\___/ |_|   |_|   \___/ \___/|_| \_|____/ 
"#;

pub fn no_results() {
    print(&format!("{}", NO_RESULTS_0.red().bold()));
}

pub fn end_of_program() {
    print(&format!("{}", "═".repeat(TOTAL_WIDTH).color(colors::SEPARATOR)));
}
