// Function registry
//
// The tokenizer only needs to know whether a bare word names a function. The
// catalogue below also carries the signature and description shown by
// autocomplete.

use serde::Serialize;

/// Function categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionCategory {
    Math,
    Logical,
    Info,
    Text,
    Lookup,
    DateTime,
    Statistical,
    Array,
    Conditional,
    Trigonometry,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionInfo {
    pub name: &'static str,
    pub signature: &'static str,
    pub description: &'static str,
    pub category: FunctionCategory,
}

/// Case-insensitive membership lookup used for FUNCTION/SYMBOL classification.
pub trait FunctionRegistry {
    fn contains(&self, name: &str) -> bool;

    fn lookup(&self, _name: &str) -> Option<&FunctionInfo> {
        None
    }

    /// Every known function, in display order.
    fn all(&self) -> Vec<&FunctionInfo> {
        Vec::new()
    }
}

const fn f(
    name: &'static str,
    signature: &'static str,
    description: &'static str,
    category: FunctionCategory,
) -> FunctionInfo {
    FunctionInfo { name, signature, description, category }
}

use FunctionCategory::*;

/// All built-in functions with their metadata
pub static FUNCTIONS: &[FunctionInfo] = &[
    // Math
    f("SUM", "SUM(number1, [number2], ...)", "Adds all the numbers in a range of cells.", Math),
    f("AVERAGE", "AVERAGE(number1, [number2], ...)", "Returns the average of the arguments.", Math),
    f("MIN", "MIN(number1, [number2], ...)", "Returns the smallest value in a set of values.", Math),
    f("MAX", "MAX(number1, [number2], ...)", "Returns the largest value in a set of values.", Math),
    f("COUNT", "COUNT(value1, [value2], ...)", "Counts the number of cells that contain numbers.", Math),
    f("COUNTA", "COUNTA(value1, [value2], ...)", "Counts the number of non-empty cells.", Math),
    f("ABS", "ABS(number)", "Returns the absolute value of a number.", Math),
    f("ROUND", "ROUND(number, num_digits)", "Rounds a number to a specified number of digits.", Math),
    f("INT", "INT(number)", "Rounds a number down to the nearest integer.", Math),
    f("MOD", "MOD(number, divisor)", "Returns the remainder after division.", Math),
    f("POWER", "POWER(number, power)", "Returns the result of a number raised to a power.", Math),
    f("SQRT", "SQRT(number)", "Returns a positive square root.", Math),
    f("CEILING", "CEILING(number, significance)", "Rounds a number up to the nearest multiple of significance.", Math),
    f("FLOOR", "FLOOR(number, significance)", "Rounds a number down to the nearest multiple of significance.", Math),
    f("PRODUCT", "PRODUCT(number1, [number2], ...)", "Multiplies all the numbers given as arguments.", Math),
    f("LOG", "LOG(number, [base])", "Returns the logarithm of a number to a specified base.", Math),
    f("LOG10", "LOG10(number)", "Returns the base-10 logarithm of a number.", Math),
    f("LN", "LN(number)", "Returns the natural logarithm of a number.", Math),
    f("EXP", "EXP(number)", "Returns e raised to the power of a given number.", Math),
    f("RAND", "RAND()", "Returns a random number between 0 and 1.", Math),
    f("RANDBETWEEN", "RANDBETWEEN(bottom, top)", "Returns a random integer between the numbers you specify.", Math),
    // Logical
    f("IF", "IF(logical_test, value_if_true, [value_if_false])", "Returns one value if a condition is true and another if false.", Logical),
    f("IFS", "IFS(logical_test1, value_if_true1, ...)", "Checks conditions and returns the value of the first true one.", Logical),
    f("AND", "AND(logical1, [logical2], ...)", "Returns TRUE if all arguments are TRUE.", Logical),
    f("OR", "OR(logical1, [logical2], ...)", "Returns TRUE if any argument is TRUE.", Logical),
    f("NOT", "NOT(logical)", "Reverses the logic of its argument.", Logical),
    f("IFERROR", "IFERROR(value, value_if_error)", "Returns a fallback value if an expression is an error.", Logical),
    f("IFNA", "IFNA(value, value_if_na)", "Returns a fallback value if an expression is #N/A.", Logical),
    f("SWITCH", "SWITCH(expression, value1, result1, ..., [default])", "Matches an expression against a list of values.", Logical),
    f("CHOOSE", "CHOOSE(index_num, value1, [value2], ...)", "Chooses a value from a list based on an index.", Logical),
    // Info
    f("ISBLANK", "ISBLANK(value)", "Returns TRUE if the value is blank.", Info),
    f("ISNUMBER", "ISNUMBER(value)", "Returns TRUE if the value is a number.", Info),
    f("ISTEXT", "ISTEXT(value)", "Returns TRUE if the value is text.", Info),
    f("ISERROR", "ISERROR(value)", "Returns TRUE if the value is any error.", Info),
    f("ISNA", "ISNA(value)", "Returns TRUE if the value is #N/A.", Info),
    // Text
    f("CONCATENATE", "CONCATENATE(text1, [text2], ...)", "Joins several text strings into one.", Text),
    f("CONCAT", "CONCAT(text1, [text2], ...)", "Joins several text strings into one.", Text),
    f("TEXTJOIN", "TEXTJOIN(delimiter, ignore_empty, text1, ...)", "Joins text with a delimiter.", Text),
    f("LEFT", "LEFT(text, [num_chars])", "Returns the leftmost characters from a text value.", Text),
    f("RIGHT", "RIGHT(text, [num_chars])", "Returns the rightmost characters from a text value.", Text),
    f("MID", "MID(text, start_num, num_chars)", "Returns characters from the middle of a text string.", Text),
    f("LEN", "LEN(text)", "Returns the number of characters in a text string.", Text),
    f("UPPER", "UPPER(text)", "Converts text to uppercase.", Text),
    f("LOWER", "LOWER(text)", "Converts text to lowercase.", Text),
    f("TRIM", "TRIM(text)", "Removes extra spaces from text.", Text),
    f("TEXT", "TEXT(value, format_text)", "Formats a number and converts it to text.", Text),
    f("VALUE", "VALUE(text)", "Converts a text string that represents a number to a number.", Text),
    f("FIND", "FIND(find_text, within_text, [start_num])", "Finds one text value within another (case-sensitive).", Text),
    f("SUBSTITUTE", "SUBSTITUTE(text, old_text, new_text, [instance_num])", "Substitutes new text for old text.", Text),
    f("REPT", "REPT(text, number_times)", "Repeats text a given number of times.", Text),
    // Conditional aggregation
    f("SUMIF", "SUMIF(range, criteria, [sum_range])", "Adds the cells specified by a given criteria.", Conditional),
    f("SUMIFS", "SUMIFS(sum_range, criteria_range1, criteria1, ...)", "Adds the cells that meet multiple criteria.", Conditional),
    f("COUNTIF", "COUNTIF(range, criteria)", "Counts the cells that meet a criteria.", Conditional),
    f("COUNTIFS", "COUNTIFS(criteria_range1, criteria1, ...)", "Counts the cells that meet multiple criteria.", Conditional),
    f("COUNTBLANK", "COUNTBLANK(range)", "Counts empty cells in a range.", Conditional),
    // Lookup
    f("VLOOKUP", "VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])", "Looks for a value in the first column of a table.", Lookup),
    f("HLOOKUP", "HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])", "Looks for a value in the top row of a table.", Lookup),
    f("XLOOKUP", "XLOOKUP(lookup_value, lookup_array, return_array, [if_not_found])", "Searches a range and returns the matching item.", Lookup),
    f("INDEX", "INDEX(array, row_num, [column_num])", "Returns a value from a table by row and column.", Lookup),
    f("MATCH", "MATCH(lookup_value, lookup_array, [match_type])", "Returns the relative position of an item in a range.", Lookup),
    f("ROW", "ROW([reference])", "Returns the row number of a reference.", Lookup),
    f("COLUMN", "COLUMN([reference])", "Returns the column number of a reference.", Lookup),
    f("ROWS", "ROWS(array)", "Returns the number of rows in a reference.", Lookup),
    f("COLUMNS", "COLUMNS(array)", "Returns the number of columns in a reference.", Lookup),
    // Date & time
    f("TODAY", "TODAY()", "Returns the current date.", DateTime),
    f("NOW", "NOW()", "Returns the current date and time.", DateTime),
    f("DATE", "DATE(year, month, day)", "Returns the serial number of a date.", DateTime),
    f("YEAR", "YEAR(serial_number)", "Returns the year of a date.", DateTime),
    f("MONTH", "MONTH(serial_number)", "Returns the month of a date.", DateTime),
    f("DAY", "DAY(serial_number)", "Returns the day of a date.", DateTime),
    f("WEEKDAY", "WEEKDAY(serial_number, [return_type])", "Returns the day of the week.", DateTime),
    f("DATEDIF", "DATEDIF(start_date, end_date, unit)", "Returns the difference between two dates.", DateTime),
    f("EDATE", "EDATE(start_date, months)", "Returns a date a number of months away.", DateTime),
    f("EOMONTH", "EOMONTH(start_date, months)", "Returns the last day of a month a number of months away.", DateTime),
    f("HOUR", "HOUR(serial_number)", "Returns the hour of a time value.", DateTime),
    f("MINUTE", "MINUTE(serial_number)", "Returns the minute of a time value.", DateTime),
    f("SECOND", "SECOND(serial_number)", "Returns the second of a time value.", DateTime),
    // Statistical
    f("MEDIAN", "MEDIAN(number1, [number2], ...)", "Returns the median of the given numbers.", Statistical),
    f("STDEV", "STDEV(number1, [number2], ...)", "Estimates standard deviation based on a sample.", Statistical),
    f("STDEV.S", "STDEV.S(number1, [number2], ...)", "Estimates standard deviation based on a sample.", Statistical),
    f("STDEV.P", "STDEV.P(number1, [number2], ...)", "Calculates standard deviation of an entire population.", Statistical),
    f("VAR", "VAR(number1, [number2], ...)", "Estimates variance based on a sample.", Statistical),
    f("VAR.S", "VAR.S(number1, [number2], ...)", "Estimates variance based on a sample.", Statistical),
    f("VAR.P", "VAR.P(number1, [number2], ...)", "Calculates variance of an entire population.", Statistical),
    // Trigonometry
    f("PI", "PI()", "Returns the value of pi.", Trigonometry),
    f("SIN", "SIN(number)", "Returns the sine of an angle.", Trigonometry),
    f("COS", "COS(number)", "Returns the cosine of an angle.", Trigonometry),
    f("TAN", "TAN(number)", "Returns the tangent of an angle.", Trigonometry),
    f("ASIN", "ASIN(number)", "Returns the arcsine of a number.", Trigonometry),
    f("ACOS", "ACOS(number)", "Returns the arccosine of a number.", Trigonometry),
    f("ATAN", "ATAN(number)", "Returns the arctangent of a number.", Trigonometry),
    f("ATAN2", "ATAN2(x_num, y_num)", "Returns the arctangent from x and y coordinates.", Trigonometry),
    f("DEGREES", "DEGREES(angle)", "Converts radians to degrees.", Trigonometry),
    f("RADIANS", "RADIANS(angle)", "Converts degrees to radians.", Trigonometry),
    // Array
    f("SEQUENCE", "SEQUENCE(rows, [columns], [start], [step])", "Generates a list of sequential numbers.", Array),
    f("TRANSPOSE", "TRANSPOSE(array)", "Flips the rows and columns of a range.", Array),
    f("SORT", "SORT(array, [sort_index], [sort_order], [by_col])", "Sorts the contents of a range.", Array),
    f("UNIQUE", "UNIQUE(array, [by_col], [exactly_once])", "Returns the unique values of a range.", Array),
    f("FILTER", "FILTER(array, include, [if_empty])", "Filters a range based on conditions.", Array),
];

/// The built-in catalogue.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFunctions;

impl FunctionRegistry for BuiltinFunctions {
    fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn lookup(&self, name: &str) -> Option<&FunctionInfo> {
        FUNCTIONS.iter().find(|info| info.name.eq_ignore_ascii_case(name))
    }

    fn all(&self) -> Vec<&FunctionInfo> {
        FUNCTIONS.iter().collect()
    }
}

/// Get functions matching a prefix (case-insensitive)
pub fn functions_by_prefix<'a>(registry: &'a dyn FunctionRegistry, prefix: &str) -> Vec<&'a FunctionInfo> {
    let prefix = prefix.to_ascii_uppercase();
    registry
        .all()
        .into_iter()
        .filter(|info| info.name.starts_with(&prefix))
        .collect()
}
