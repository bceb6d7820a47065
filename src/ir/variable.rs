/// A handle to one variable of the IR. The id is assigned by the program
/// builder when the producing instruction is appended and is never reused
/// within a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable(pub u32);

impl Variable {
    pub fn print(&self) -> String {
        format!("v{}", self.0)
    }
}
