use super::operation::Operation;
use super::variable::Variable;

/// An IL instruction: one operation plus the runtime variables it touches.
/// `inputs` are consumed, `outputs` are produced into the surrounding
/// scope, and `temp` holds the inner variables a block-opening operation
/// binds for its body (parameters, `this`, loop variables, the caught
/// exception).
pub struct Instruction {
    pub idx: u32,
    pub operation: Box<dyn Operation>,
    pub inputs: Vec<Variable>,
    pub outputs: Vec<Variable>,
    pub temp: Vec<Variable>,
}

impl Instruction {
    pub fn new(
        idx: u32,
        operation: Box<dyn Operation>,
        inputs: Vec<Variable>,
        outputs: Vec<Variable>,
        temp: Vec<Variable>,
    ) -> Self {
        debug_assert!(
            inputs.len() == operation.num_inputs() as usize,
            "Incorrect no. of inputs provided. Expected {}, got {}",
            operation.num_inputs(),
            inputs.len()
        );
        debug_assert!(
            outputs.len() == operation.num_outputs() as usize,
            "Incorrect no. of outputs provided. Expected {}, got {}",
            operation.num_outputs(),
            outputs.len()
        );
        debug_assert!(
            temp.len() == operation.num_temp() as usize,
            "Incorrect no. of temps provided. Expected {}, got {}",
            operation.num_temp(),
            temp.len()
        );

        Self {
            idx,
            operation,
            inputs,
            outputs,
            temp,
        }
    }

    /// Helper functions to get the value at the nth position of the
    /// input/output/temp vectors

    pub fn input_at(&self, idx: usize) -> &Variable {
        debug_assert!(idx < self.inputs.len(), "Invalid idx provided");
        &self.inputs[idx]
    }

    pub fn output_at(&self, idx: usize) -> &Variable {
        debug_assert!(idx < self.outputs.len(), "Invalid idx provided");
        &self.outputs[idx]
    }

    pub fn temp_at(&self, idx: usize) -> &Variable {
        debug_assert!(
            idx < self.temp.len(),
            "Invalid idx {} provided for len {}",
            idx,
            self.temp.len()
        );
        &self.temp[idx]
    }

    /// Helper functions to get all the inputs and outputs of this instruction

    pub fn inputs(&self) -> &Vec<Variable> {
        &self.inputs
    }

    pub fn outputs(&self) -> &Vec<Variable> {
        &self.outputs
    }

    pub fn temp(&self) -> &Vec<Variable> {
        &self.temp
    }

    pub fn cast_into<T: Operation + 'static>(&self) -> &T {
        self.operation.as_any().downcast_ref::<T>().unwrap()
    }

    /// Display the instruction. Only valid for debugging
    #[cfg(debug_assertions)]
    pub fn _print(&self) -> String {
        let mut s = String::new();
        for o in &self.outputs {
            s.push_str(&o.print());
            s.push_str(", ");
        }

        if !self.outputs.is_empty() {
            s.truncate(s.len() - 2);
            s.push_str(" = ");
        }

        s.push_str(&format!("{:?}(", self.operation.opcode()));
        for (n, i) in self.inputs.iter().enumerate() {
            if n != 0 {
                s.push_str(", ");
            }
            s.push_str(&i.print());
        }
        s.push(')');

        s
    }
}

//////////////////////////////////////////////
//////////////// TESTS ///////////////////////
//////////////////////////////////////////////
