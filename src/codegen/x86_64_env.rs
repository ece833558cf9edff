pub trait Env {
    const ENTRY_POINT: &str;

    const GLOBAL_PROLOGUE: &str;

    const SECTION_TEXT: &str;
    const SECTION_DATA: &str;

    /// How a call to a libc function is spelled on this target.
    const PRINTF: &str;
    const EXIT: &str;
}

impl Env for Darwin {
    const ENTRY_POINT: &str = "_main";

    const GLOBAL_PROLOGUE: &str = ".intel_syntax noprefix\n";

    const SECTION_TEXT: &str = "__TEXT,__text,regular,pure_instructions";
    const SECTION_DATA: &str = "__DATA,__data";

    const PRINTF: &str = "_printf";
    const EXIT: &str = "_exit";
}

impl Env for Linux {
    const ENTRY_POINT: &str = "main";

    const GLOBAL_PROLOGUE: &str = concat!(
        ".intel_syntax noprefix\n",
        ".section .note.GNU-stack,\"\",@progbits\n",
    );

    const SECTION_TEXT: &str = ".text";
    const SECTION_DATA: &str = ".data";

    const PRINTF: &str = "printf@PLT";
    const EXIT: &str = "exit@PLT";
}

pub struct Darwin;

pub struct Linux;
