use snowflaked::sync::Generator;

const INSTANCE: u16 = 0;

pub static TOURNAMENT: Generator = Generator::new_unchecked(INSTANCE);
pub static REMINDER: Generator = Generator::new_unchecked(INSTANCE);
