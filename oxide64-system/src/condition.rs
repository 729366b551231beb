// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use oxide64_core::factory::{Cpu, Register};

enum Operator {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operator::Equal => write!(f, "=="),
            Operator::NotEqual => write!(f, "!="),
            Operator::Greater => write!(f, ">"),
            Operator::GreaterEqual => write!(f, ">="),
            Operator::Less => write!(f, "<"),
            Operator::LessEqual => write!(f, "<="),
        }
    }
}

enum Reg {
    A,
    X,
    Y,
    P,
    SP,
    PC,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Reg::A => write!(f, "A"),
            Reg::X => write!(f, "X"),
            Reg::Y => write!(f, "Y"),
            Reg::P => write!(f, "P"),
            Reg::SP => write!(f, "SP"),
            Reg::PC => write!(f, "PC"),
        }
    }
}

enum Value {
    Constant(u16),
    Register(Reg),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Constant(val) if val <= 0xff => write!(f, "{:02x}", val),
            Value::Constant(val) => write!(f, "{:04x}", val),
            Value::Register(ref reg) => write!(f, "{}", reg),
        }
    }
}

/// Conditional expression attached to a breakpoint, e.g. `A == 10`.
pub struct Condition {
    op: Operator,
    reg: Reg,
    val: Value,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.reg, self.op, self.val)
    }
}

impl Condition {
    pub fn parse(expr: &str, radix: Option<u32>) -> Result<Condition, String> {
        let parser = Parser::new(radix.unwrap_or(16));
        parser.parse(expr)
    }

    pub fn eval(&self, cpu: &dyn Cpu) -> bool {
        let left = self.eval_reg(&self.reg, cpu);
        let right = self.eval_val(&self.val, cpu);
        match self.op {
            Operator::Equal => left == right,
            Operator::NotEqual => left != right,
            Operator::Greater => left > right,
            Operator::GreaterEqual => left >= right,
            Operator::Less => left < right,
            Operator::LessEqual => left <= right,
        }
    }

    fn eval_reg(&self, reg: &Reg, cpu: &dyn Cpu) -> u16 {
        match *reg {
            Reg::A => u16::from(cpu.get_register(Register::A)),
            Reg::X => u16::from(cpu.get_register(Register::X)),
            Reg::Y => u16::from(cpu.get_register(Register::Y)),
            Reg::P => u16::from(cpu.get_register(Register::P)),
            Reg::SP => u16::from(cpu.get_register(Register::SP)),
            Reg::PC => cpu.get_pc(),
        }
    }

    fn eval_val(&self, val: &Value, cpu: &dyn Cpu) -> u16 {
        match *val {
            Value::Constant(value) => value,
            Value::Register(ref reg) => self.eval_reg(reg, cpu),
        }
    }
}

struct Parser {
    radix: u32,
}

impl Parser {
    pub fn new(radix: u32) -> Self {
        Parser { radix }
    }

    pub fn parse(&self, expr: &str) -> Result<Condition, String> {
        let mut tokenizer = Tokenizer::new(expr.chars());
        let reg = match tokenizer.next() {
            Some(Token::Atom(token)) => self.parse_reg(token.as_str()),
            _ => Err(format!("Invalid expression {}", expr)),
        }?;
        let op = match tokenizer.next() {
            Some(Token::Op(token)) => self.parse_op(token.as_str()),
            _ => Err(format!("Invalid expression {}", expr)),
        }?;
        let val = match tokenizer.next() {
            Some(Token::Atom(token)) => self.parse_val(token.as_str()),
            _ => Err(format!("Invalid expression {}", expr)),
        }?;
        Ok(Condition { op, reg, val })
    }

    fn parse_num(&self, num: &str) -> Result<u16, String> {
        u16::from_str_radix(num, self.radix).map_err(|_| format!("Invalid number {}", num))
    }

    fn parse_op(&self, op: &str) -> Result<Operator, String> {
        match op {
            "==" => Ok(Operator::Equal),
            "!=" => Ok(Operator::NotEqual),
            ">" => Ok(Operator::Greater),
            ">=" => Ok(Operator::GreaterEqual),
            "<" => Ok(Operator::Less),
            "<=" => Ok(Operator::LessEqual),
            _ => Err(format!("Invalid op {}", op)),
        }
    }

    fn parse_reg(&self, reg: &str) -> Result<Reg, String> {
        match reg {
            "a" | "A" => Ok(Reg::A),
            "x" | "X" => Ok(Reg::X),
            "y" | "Y" => Ok(Reg::Y),
            "p" | "P" => Ok(Reg::P),
            "sp" | "SP" => Ok(Reg::SP),
            "pc" | "PC" => Ok(Reg::PC),
            _ => Err(format!("Invalid register {}", reg)),
        }
    }

    fn parse_val(&self, val: &str) -> Result<Value, String> {
        match self.parse_reg(val) {
            Ok(reg) => Ok(Value::Register(reg)),
            Err(_) => self.parse_num(val).map(Value::Constant),
        }
    }
}

#[derive(Eq, PartialEq)]
enum Token {
    Atom(String),
    Op(String),
}

struct Tokenizer<'a> {
    iter: Peekable<Chars<'a>>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: Chars<'a>) -> Tokenizer<'a> {
        Tokenizer {
            iter: input.peekable(),
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.iter.peek() {
            Some(&c) if c.is_alphanumeric() => Some(Token::Atom(consume_while(&mut self.iter, |c| {
                c.is_alphanumeric()
            }))),
            Some(&c) if is_symbol(c) => {
                Some(Token::Op(consume_while(&mut self.iter, is_symbol)))
            }
            Some(&c) if c.is_whitespace() => {
                self.iter.next();
                self.next()
            }
            Some(_) => {
                self.iter.next();
                self.next()
            }
            None => None,
        }
    }
}

fn consume_while<F>(iter: &mut Peekable<Chars<'_>>, predicate: F) -> String
where
    F: Fn(char) -> bool,
{
    let mut result = String::new();
    while let Some(&c) = iter.peek() {
        if predicate(c) {
            result.push(c);
            iter.next();
        } else {
            break;
        }
    }
    result
}

fn is_symbol(c: char) -> bool {
    c == '=' || c == '!' || c == '<' || c == '>'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_equality() {
        let condition = Condition::parse("A == 10", Some(16)).unwrap();
        assert_eq!("A == 10", format!("{}", condition));
    }

    #[test]
    fn parse_register_comparison() {
        let condition = Condition::parse("x != y", None).unwrap();
        assert_eq!("X != Y", format!("{}", condition));
    }

    #[test]
    fn parse_invalid_register() {
        assert!(Condition::parse("q == 10", None).is_err());
    }
}
